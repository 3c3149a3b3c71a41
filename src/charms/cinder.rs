use anyhow::Result;

use crate::types::{CharmDescriptor, RelationEdge};

pub const CHARM_NAME: &str = "cinder";

/// Block storage service. Relates to the image service, the message bus,
/// identity and the compute controller.
pub fn cinder_descriptor() -> Result<CharmDescriptor> {
    Ok(CharmDescriptor::new(CHARM_NAME, "Cinder", 10, 5)
        .with_relation(
            "glance",
            RelationEdge::parse("cinder:image-service", "glance:image-service")?,
        )
        .with_relation(
            "rabbitmq-server",
            RelationEdge::parse("rabbitmq-server:amqp", "cinder:amqp")?,
        )
        .with_relation(
            "keystone",
            RelationEdge::parse("cinder:identity-service", "keystone:identity-service")?,
        )
        .with_relation(
            "nova-cloud-controller",
            RelationEdge::parse(
                "nova-cloud-controller:cinder-volume-service",
                "cinder:cinder-volume-service",
            )?,
        ))
}
