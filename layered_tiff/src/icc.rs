use lcms2::Profile;

use crate::{config::ColorProfile, Result};

/// The built-in sRGB profile, serialized.
pub fn srgb_profile() -> Result<Vec<u8>> {
    Ok(Profile::new_srgb().icc()?)
}

impl ColorProfile {
    /// ICC bytes to embed, if any.
    pub fn icc(&self) -> Result<Option<Vec<u8>>> {
        Ok(match self {
            ColorProfile::Srgb => Some(srgb_profile()?),
            ColorProfile::None => None,
            ColorProfile::Custom(data) => Some(data.clone()),
        })
    }
}
