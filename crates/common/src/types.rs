use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Returns true for the all-zero UUID, which is never a valid reference.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a locally-owned aggregate instance (reading, alert).
    AggregateId
);

uuid_id!(
    /// Identifier of a sensor owned by the farm service.
    SensorId
);

uuid_id!(
    /// Identifier of an owner (user) owned by the identity service.
    OwnerId
);

uuid_id!(
    /// Identifier of a property owned by the farm service.
    PropertyId
);

uuid_id!(
    /// Identifier of a plot owned by the farm service.
    PlotId
);

uuid_id!(
    /// Ties a causal chain of events together across services.
    CorrelationId
);

uuid_id!(
    /// Identifier of one integration event, stable across redeliveries.
    EventId
);
