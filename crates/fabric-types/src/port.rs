//! Switch port identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a physical switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port{}", self.0)
    }
}

/// Identifier of a link aggregate (LAG / port channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatePortId(pub u32);

impl fmt::Display for AggregatePortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agg{}", self.0)
    }
}

/// A port a forwarding entry can be bound to: a physical port or an
/// aggregate.
///
/// Neighbor entries store one of these so that aggregate membership
/// churn does not invalidate entries learned over the LAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PortDescriptor {
    Physical(PortId),
    Aggregate(AggregatePortId),
}

impl PortDescriptor {
    /// Returns the physical port ID if this is a physical port.
    pub const fn as_physical(&self) -> Option<PortId> {
        match self {
            PortDescriptor::Physical(id) => Some(*id),
            PortDescriptor::Aggregate(_) => None,
        }
    }

    /// Returns the aggregate port ID if this is an aggregate.
    pub const fn as_aggregate(&self) -> Option<AggregatePortId> {
        match self {
            PortDescriptor::Physical(_) => None,
            PortDescriptor::Aggregate(id) => Some(*id),
        }
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDescriptor::Physical(id) => id.fmt(f),
            PortDescriptor::Aggregate(id) => id.fmt(f),
        }
    }
}

impl From<PortId> for PortDescriptor {
    fn from(id: PortId) -> Self {
        PortDescriptor::Physical(id)
    }
}

impl From<AggregatePortId> for PortDescriptor {
    fn from(id: AggregatePortId) -> Self {
        PortDescriptor::Aggregate(id)
    }
}

impl FromStr for PortDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("port") {
            let id = rest
                .parse()
                .map_err(|_| ParseError::InvalidPortDescriptor(s.to_string()))?;
            Ok(PortDescriptor::Physical(PortId(id)))
        } else if let Some(rest) = s.strip_prefix("agg") {
            let id = rest
                .parse()
                .map_err(|_| ParseError::InvalidPortDescriptor(s.to_string()))?;
            Ok(PortDescriptor::Aggregate(AggregatePortId(id)))
        } else {
            Err(ParseError::InvalidPortDescriptor(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_descriptor_accessors() {
        let phys = PortDescriptor::Physical(PortId(3));
        assert_eq!(phys.as_physical(), Some(PortId(3)));
        assert_eq!(phys.as_aggregate(), None);

        let agg = PortDescriptor::Aggregate(AggregatePortId(7));
        assert_eq!(agg.as_physical(), None);
        assert_eq!(agg.as_aggregate(), Some(AggregatePortId(7)));
    }

    #[test]
    fn test_descriptor_parse() {
        assert_eq!(
            "port12".parse::<PortDescriptor>().unwrap(),
            PortDescriptor::Physical(PortId(12))
        );
        assert_eq!(
            "agg2".parse::<PortDescriptor>().unwrap(),
            PortDescriptor::Aggregate(AggregatePortId(2))
        );
        assert!("eth0".parse::<PortDescriptor>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(PortId(5).to_string(), "port5");
        assert_eq!(AggregatePortId(1).to_string(), "agg1");
    }
}
