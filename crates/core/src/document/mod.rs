//! Sparse per-column pixel records exchanged between the scanner and the
//! synthesizers.
//!
//! The serde representation is the on-disk wire format:
//! `{image_width, image_height, data: [{time_step, pixels: [{y, brightness, rgb}]}]}`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SonifyError};

/// One pixel whose luma exceeded the scan threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelEvent {
    #[serde(rename = "y")]
    pub row: u32,
    pub brightness: u8,
    #[serde(rename = "rgb")]
    pub color: [u8; 3],
}

/// All qualifying pixels of one image column, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStepColumn {
    #[serde(rename = "time_step")]
    pub index: u32,
    #[serde(rename = "pixels")]
    pub events: Vec<PixelEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDocument {
    #[serde(rename = "image_width")]
    pub width: u32,
    #[serde(rename = "image_height")]
    pub height: u32,
    #[serde(rename = "data")]
    pub columns: Vec<TimeStepColumn>,
}

impl ScanDocument {
    /// Total number of pixel events across all columns.
    pub fn event_count(&self) -> usize {
        self.columns.iter().map(|column| column.events.len()).sum()
    }

    pub fn is_silent(&self) -> bool {
        self.columns.is_empty()
    }

    /// Checks the structural invariants every stage relies on.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SonifyError::document(format!(
                "image dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }

        let mut previous: Option<u32> = None;
        for column in &self.columns {
            if column.index >= self.width {
                return Err(SonifyError::document(format!(
                    "time step {} is outside image width {}",
                    column.index, self.width
                )));
            }
            if previous.is_some_and(|prev| column.index <= prev) {
                return Err(SonifyError::document(format!(
                    "time step {} is not strictly after the previous column",
                    column.index
                )));
            }
            if column.events.is_empty() {
                return Err(SonifyError::document(format!(
                    "time step {} has no pixels",
                    column.index
                )));
            }
            if let Some(event) = column.events.iter().find(|e| e.row >= self.height) {
                return Err(SonifyError::document(format!(
                    "row {} in time step {} is outside image height {}",
                    event.row, column.index, self.height
                )));
            }
            previous = Some(column.index);
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Writes the document, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(row: u32, brightness: u8) -> PixelEvent {
        PixelEvent {
            row,
            brightness,
            color: [brightness, 0, 0],
        }
    }

    fn document(columns: Vec<TimeStepColumn>) -> ScanDocument {
        ScanDocument {
            width: 4,
            height: 3,
            columns,
        }
    }

    #[test]
    fn serializes_to_wire_field_names() {
        let doc = document(vec![TimeStepColumn {
            index: 1,
            events: vec![PixelEvent {
                row: 2,
                brightness: 200,
                color: [10, 20, 30],
            }],
        }]);

        let json = doc.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"image_width":4,"image_height":3,"data":[{"time_step":1,"pixels":[{"y":2,"brightness":200,"rgb":[10,20,30]}]}]}"#
        );
        assert_eq!(ScanDocument::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn rejects_out_of_order_columns() {
        let doc = document(vec![
            TimeStepColumn {
                index: 2,
                events: vec![event(0, 50)],
            },
            TimeStepColumn {
                index: 2,
                events: vec![event(1, 50)],
            },
        ]);
        assert!(matches!(
            doc.validate(),
            Err(SonifyError::InvalidDocument(_))
        ));
    }

    #[test]
    fn rejects_rows_outside_the_image() {
        let doc = document(vec![TimeStepColumn {
            index: 0,
            events: vec![event(3, 50)],
        }]);
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn rejects_floating_point_values_on_load() {
        let json = r#"{"image_width":1,"image_height":1,"data":[{"time_step":0,"pixels":[{"y":0,"brightness":20.5,"rgb":[1,2,3]}]}]}"#;
        assert!(ScanDocument::from_json(json).is_err());
    }

    #[test]
    fn empty_documents_are_valid_and_silent() {
        let doc = document(Vec::new());
        doc.validate().unwrap();
        assert!(doc.is_silent());
        assert_eq!(doc.event_count(), 0);
    }

    #[test]
    fn saves_and_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("frame.json");
        let doc = document(vec![TimeStepColumn {
            index: 3,
            events: vec![event(0, 21), event(2, 255)],
        }]);

        doc.save(&path).unwrap();
        assert_eq!(ScanDocument::load(&path).unwrap(), doc);
    }
}
