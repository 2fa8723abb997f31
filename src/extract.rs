//! Per-hour tables extracted from one day's intertie and load documents.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::report_xml::{read_document, NodePath, XmlElement, XmlError};

pub const INTERTIE_NAMESPACE: &str = "http://www.theIMO.com/schema";
pub const LOAD_NAMESPACE: &str = "http://www.ieso.ca/schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntertieField {
    Hour,
    Import,
    Export,
}

impl IntertieField {
    pub const ALL: [IntertieField; 3] = [Self::Hour, Self::Import, Self::Export];

    pub fn element_name(self) -> &'static str {
        match self {
            Self::Hour => "Hour",
            Self::Import => "Import",
            Self::Export => "Export",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadQuantity {
    TotalEnergy,
    TotalLoss,
    TotalLoad,
}

impl LoadQuantity {
    pub const ALL: [LoadQuantity; 3] = [Self::TotalEnergy, Self::TotalLoss, Self::TotalLoad];

    /// Value of the `MarketQuantity` element in the source document.
    pub fn label(self) -> &'static str {
        match self {
            Self::TotalEnergy => "Total Energy",
            Self::TotalLoss => "Total Loss",
            Self::TotalLoad => "Total Load",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntertieLayout {
    pub namespace: &'static str,
    /// Parents of the per-hour schedule entries.
    pub schedules: NodePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadLayout {
    pub namespace: &'static str,
    pub hourly_blocks: NodePath,
    pub hour: &'static str,
    pub quantity: &'static str,
    pub quantity_label: &'static str,
    pub quantity_value: &'static str,
}

pub const INTERTIE_LAYOUT: IntertieLayout = IntertieLayout {
    namespace: INTERTIE_NAMESPACE,
    schedules: NodePath {
        namespace: INTERTIE_NAMESPACE,
        segments: &["Totals", "Schedules"],
    },
};

pub const LOAD_LAYOUT: LoadLayout = LoadLayout {
    namespace: LOAD_NAMESPACE,
    hourly_blocks: NodePath {
        namespace: LOAD_NAMESPACE,
        segments: &["Energies", "HourlyConstrainedEnergy"],
    },
    hour: "DeliveryHour",
    quantity: "MQ",
    quantity_label: "MarketQuantity",
    quantity_value: "EnergyMW",
};

impl LoadLayout {
    /// The `MQ` node carrying `quantity` inside one hourly block.
    pub fn find_quantity<'a>(
        &self,
        block: &'a XmlElement,
        quantity: LoadQuantity,
    ) -> Option<&'a XmlElement> {
        block.children_named(self.namespace, self.quantity).find(|mq| {
            mq.child_named(self.namespace, self.quantity_label)
                .map(|label| label.text() == quantity.label())
                .unwrap_or(false)
        })
    }

    /// True when some hourly block of the document carries `quantity`.
    pub fn has_quantity(&self, root: &XmlElement, quantity: LoadQuantity) -> bool {
        root.find_all(&self.hourly_blocks)
            .into_iter()
            .any(|block| self.find_quantity(block, quantity).is_some())
    }
}

impl IntertieLayout {
    /// Per-hour schedule entries under every Totals/Schedules node, in
    /// document order.
    pub fn entries<'a>(&self, root: &'a XmlElement) -> Vec<&'a XmlElement> {
        root.find_all(&self.schedules)
            .into_iter()
            .flat_map(|schedules| schedules.children.iter())
            .collect()
    }

    /// True when some schedule entry carries `field` at any depth.
    pub fn has_field(&self, root: &XmlElement, field: IntertieField) -> bool {
        self.entries(root).into_iter().any(|entry| {
            entry
                .descendants()
                .into_iter()
                .any(|node| node.is(self.namespace, field.element_name()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntertieHourRecord {
    pub hour: String,
    pub import: String,
    pub export: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadHourRecord {
    pub hour: String,
    pub total_energy: String,
    pub total_loss: String,
    pub total_load: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {file}: {source}")]
    Document {
        file: String,
        #[source]
        source: XmlError,
    },
    #[error("{file}: schedule entry #{entry} has no {element} element")]
    MissingElement {
        file: String,
        entry: usize,
        element: &'static str,
    },
    #[error("{file}: hour {hour} has no '{label}' quantity")]
    MissingQuantity {
        file: String,
        hour: String,
        label: &'static str,
    },
}

pub fn extract_intertie_file(path: &Path) -> Result<Vec<IntertieHourRecord>, ExtractError> {
    let file = display_name(path);
    let root = read_document(path).map_err(|source| ExtractError::Document {
        file: file.clone(),
        source,
    })?;
    extract_intertie(&root, &file)
}

pub fn extract_load_file(path: &Path) -> Result<Vec<LoadHourRecord>, ExtractError> {
    let file = display_name(path);
    let root = read_document(path).map_err(|source| ExtractError::Document {
        file: file.clone(),
        source,
    })?;
    extract_load(&root, &file)
}

/// One row per schedule entry under Totals/Schedules, in document order.
pub fn extract_intertie(
    root: &XmlElement,
    file: &str,
) -> Result<Vec<IntertieHourRecord>, ExtractError> {
    let mut rows = Vec::new();
    for (entry_idx, entry) in INTERTIE_LAYOUT.entries(root).into_iter().enumerate() {
        let mut values: [Option<&str>; 3] = [None; 3];
        for node in entry.descendants() {
            for (slot, field) in IntertieField::ALL.iter().enumerate() {
                let matches = node.is(INTERTIE_LAYOUT.namespace, field.element_name());
                if matches && values[slot].is_none() {
                    values[slot] = Some(node.text());
                }
            }
        }

        let take = |slot: usize| {
            values[slot]
                .map(str::to_string)
                .ok_or_else(|| ExtractError::MissingElement {
                    file: file.to_string(),
                    entry: entry_idx,
                    element: IntertieField::ALL[slot].element_name(),
                })
        };
        rows.push(IntertieHourRecord {
            hour: take(0)?,
            import: take(1)?,
            export: take(2)?,
        });
    }

    debug!(
        component = "extract",
        event = "extract.intertie.finish",
        file,
        rows = rows.len()
    );
    Ok(rows)
}

/// One row per DeliveryHour, with the three totals read from the same block.
pub fn extract_load(root: &XmlElement, file: &str) -> Result<Vec<LoadHourRecord>, ExtractError> {
    let layout = &LOAD_LAYOUT;
    let mut rows = Vec::new();

    for block in root.find_all(&layout.hourly_blocks) {
        for hour in block.children_named(layout.namespace, layout.hour) {
            let hour = hour.text().to_string();
            let value = |quantity: LoadQuantity| {
                layout
                    .find_quantity(block, quantity)
                    .and_then(|mq| mq.child_named(layout.namespace, layout.quantity_value))
                    .map(|value| value.text().to_string())
                    .ok_or_else(|| ExtractError::MissingQuantity {
                        file: file.to_string(),
                        hour: hour.clone(),
                        label: quantity.label(),
                    })
            };

            let total_energy = value(LoadQuantity::TotalEnergy)?;
            let total_loss = value(LoadQuantity::TotalLoss)?;
            let total_load = value(LoadQuantity::TotalLoad)?;

            rows.push(LoadHourRecord {
                hour,
                total_energy,
                total_loss,
                total_load,
            });
        }
    }

    debug!(
        component = "extract",
        event = "extract.load.finish",
        file,
        rows = rows.len()
    );
    Ok(rows)
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
