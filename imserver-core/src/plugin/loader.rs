use super::InputMethodPlugin;
use crate::error::PluginError;
use std::path::Path;

/// Turns a candidate file from a plugin directory into a plugin
pub trait PluginLoader {
    fn load(&mut self, path: &Path) -> Result<Box<dyn InputMethodPlugin>, PluginError>;
}

impl<F> PluginLoader for F
where
    F: FnMut(&Path) -> Result<Box<dyn InputMethodPlugin>, PluginError>,
{
    fn load(&mut self, path: &Path) -> Result<Box<dyn InputMethodPlugin>, PluginError> {
        self(path)
    }
}
