//! Port and aggregate-port nodes of the switch state tree.

use fabric_types::{AggregatePortId, PortId};

/// A physical switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    id: PortId,
    name: String,
    admin_up: bool,
}

impl Port {
    pub fn new(id: PortId, name: impl Into<String>, admin_up: bool) -> Self {
        Port {
            id,
            name: name.into(),
            admin_up,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_admin_up(&self) -> bool {
        self.admin_up
    }

    /// Clone with a different admin state.
    pub fn with_admin_up(&self, admin_up: bool) -> Self {
        Port {
            id: self.id,
            name: self.name.clone(),
            admin_up,
        }
    }
}

/// A link aggregate and its current member ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatePort {
    id: AggregatePortId,
    name: String,
    members: Vec<PortId>,
}

impl AggregatePort {
    pub fn new(id: AggregatePortId, name: impl Into<String>, members: Vec<PortId>) -> Self {
        AggregatePort {
            id,
            name: name.into(),
            members,
        }
    }

    pub fn id(&self) -> AggregatePortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[PortId] {
        &self.members
    }

    /// Clone with a different member set.
    pub fn with_members(&self, members: Vec<PortId>) -> Self {
        AggregatePort {
            id: self.id,
            name: self.name.clone(),
            members,
        }
    }
}
