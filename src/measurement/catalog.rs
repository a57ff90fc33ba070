use std::collections::HashMap;

use super::error::MeasurementError;
use crate::generator::{PacketGenerator, PortDescriptor, PortId};

/// Interface name paired with the generator's identifier for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
    pub name: String,
    pub id: PortId,
}

/// Snapshot of the generator's port list, taken once at startup.
#[derive(Debug, Clone, Default)]
pub struct PortCatalog {
    ports: Vec<PortRef>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<PortId, usize>,
}

impl PortCatalog {
    pub async fn discover<G: PacketGenerator + ?Sized>(
        generator: &G,
    ) -> Result<Self, MeasurementError> {
        let descriptors = generator.list_ports().await?;
        Self::from_descriptors(descriptors)
    }

    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = PortDescriptor>,
    ) -> Result<Self, MeasurementError> {
        let mut catalog = PortCatalog::default();
        for descriptor in descriptors {
            let index = catalog.ports.len();
            if catalog.by_name.insert(descriptor.name.clone(), index).is_some()
                || catalog.by_id.insert(descriptor.id, index).is_some()
            {
                return Err(MeasurementError::AmbiguousPort(descriptor.name));
            }
            catalog.ports.push(PortRef {
                name: descriptor.name,
                id: descriptor.id,
            });
        }
        Ok(catalog)
    }

    pub fn resolve(&self, name: &str) -> Result<PortRef, MeasurementError> {
        self.by_name
            .get(name)
            .map(|&index| self.ports[index].clone())
            .ok_or_else(|| MeasurementError::UnknownPort(name.to_string()))
    }

    pub fn name_of(&self, id: PortId) -> Result<&str, MeasurementError> {
        self.by_id
            .get(&id)
            .map(|&index| self.ports[index].name.as_str())
            .ok_or_else(|| MeasurementError::unknown_port_id(id))
    }

    /// Ports in the order the generator listed them.
    pub fn ports(&self) -> &[PortRef] {
        &self.ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: u32, name: &str) -> PortDescriptor {
        PortDescriptor {
            id: PortId(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn resolves_both_directions() {
        let catalog =
            PortCatalog::from_descriptors([descriptor(0, "eth0"), descriptor(4, "eth7")]).unwrap();

        assert_eq!(
            catalog.resolve("eth7").unwrap(),
            PortRef {
                name: "eth7".to_string(),
                id: PortId(4),
            }
        );
        assert_eq!(catalog.name_of(PortId(0)).unwrap(), "eth0");
        assert_eq!(catalog.ports().len(), 2);
    }

    #[test]
    fn unknown_name_or_id_fails() {
        let catalog = PortCatalog::from_descriptors([descriptor(0, "eth0")]).unwrap();
        assert!(matches!(
            catalog.resolve("eth9"),
            Err(MeasurementError::UnknownPort(name)) if name == "eth9"
        ));
        assert!(matches!(
            catalog.name_of(PortId(9)),
            Err(MeasurementError::UnknownPort(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = PortCatalog::from_descriptors([descriptor(0, "eth0"), descriptor(1, "eth0")]);
        assert!(matches!(result, Err(MeasurementError::AmbiguousPort(name)) if name == "eth0"));
    }
}
