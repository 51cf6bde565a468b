//! Static controller description exposed to the host framework.

use serde::Serialize;

/// Largest axis number the host may register.
pub const MAX_DEVICE: usize = 1024;

/// Descriptive metadata for the controller class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ControllerInfo {
    /// Controller class name
    pub class_name: &'static str,
    /// Controller family shown by the host
    pub gender: &'static str,
    /// Hardware model
    pub model: &'static str,
    /// Maintaining organization
    pub organization: &'static str,
    /// Logo image file
    pub logo: &'static str,
    /// Largest axis number
    pub max_device: usize,
}

/// Metadata of [`ImgBeamAnalyzerCtrl`](crate::controller::ImgBeamAnalyzerCtrl).
pub static CONTROLLER_INFO: ControllerInfo = ControllerInfo {
    class_name: "ImgBeamAnalyzerController",
    gender: "ImgBeamAnalyzer Counter",
    model: "ImgBeamAnalyzer_CT",
    organization: "CELLS - ALBA",
    logo: "ALBA_logo.png",
    max_device: MAX_DEVICE,
};
