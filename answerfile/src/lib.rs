//! Text artifacts generated from validated node profiles.
//!
//! Everything here is a pure function of its arguments: the answer file of
//! one profile, the iPXE menu over a list of profiles, the dnsmasq snippet
//! and the build manifest / workflow inputs / issue link that hand a build
//! to CI. Nothing reads the profile store or any other state.

pub mod answer;
mod error;
pub mod manifest;
pub mod menu;

pub use answer::{answer_file_name, file_stem, render_answer};
pub use error::{RenderError, Result};
pub use manifest::{
    build_request_issue_url, render_manifest, render_manifest_at, workflow_inputs, BuildManifest,
    BuildOptions, IsoSource, MANIFEST_FILE_NAME,
};
pub use menu::{
    menu_label, pages_base_url, render_boot_menu, render_chain_script, render_dnsmasq,
    DnsmasqOptions, MENU_PATH,
};
