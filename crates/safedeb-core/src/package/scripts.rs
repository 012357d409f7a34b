//! Lifecycle script slots.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::BuildError;

/// One of the four maintainer script slots in the control directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintainerScript {
    /// Runs before unpacking.
    PreInst,
    /// Runs after unpacking.
    PostInst,
    /// Runs before removal.
    PreRm,
    /// Runs after removal.
    PostRm,
}

impl MaintainerScript {
    /// Every slot, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::PreInst, Self::PostInst, Self::PreRm, Self::PostRm];

    /// File name inside the control directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::PreInst => "preinst",
            Self::PostInst => "postinst",
            Self::PreRm => "prerm",
            Self::PostRm => "postrm",
        }
    }

    /// Infers the slot from a script file name by prefix, so `postinst.sh`
    /// and `postinst-custom` both map to [`MaintainerScript::PostInst`].
    ///
    /// # Examples
    ///
    /// ```
    /// use safedeb_core::MaintainerScript;
    /// use std::path::Path;
    ///
    /// assert_eq!(
    ///     MaintainerScript::from_file_name(Path::new("scripts/prerm.sh")),
    ///     Some(MaintainerScript::PreRm)
    /// );
    /// assert_eq!(MaintainerScript::from_file_name(Path::new("install.sh")), None);
    /// ```
    #[must_use]
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let base = path.file_name()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|slot| base.starts_with(slot.file_name()))
    }
}

impl fmt::Display for MaintainerScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for MaintainerScript {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.file_name() == s)
            .ok_or_else(|| BuildError::InvalidScriptName {
                name: s.to_string(),
            })
    }
}
