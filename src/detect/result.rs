use crate::geometry::BoundingBox;

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub payload: String,
    pub symbology: Symbology,
}

impl Detection {
    pub fn qr(bbox: BoundingBox, payload: impl Into<String>) -> Self {
        Self {
            bbox,
            payload: payload.into(),
            symbology: Symbology::QrCode,
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbology {
    QrCode,
}

impl Symbology {
    pub fn label(&self) -> &'static str {
        match self {
            Symbology::QrCode => "QRCODE",
        }
    }
}
