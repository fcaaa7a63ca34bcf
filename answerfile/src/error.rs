use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[derive(Error, Debug, Diagnostic)]
pub enum RenderError {
    #[error("a build manifest needs at least one profile")]
    #[diagnostic(code(render::empty_profile_list))]
    EmptyProfileList,

    #[error("profiles '{first}' and '{second}' share the boot menu label '{label}'")]
    #[diagnostic(
        code(render::duplicate_menu_label),
        help("rename one of the profiles; menu labels are derived from the lowercased name")
    )]
    DuplicateMenuLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("invalid ISO URL '{0}'")]
    #[diagnostic(code(render::iso_url))]
    IsoUrl(String),

    #[error("release tag must not be empty")]
    #[diagnostic(code(render::release_tag))]
    EmptyReleaseTag,

    #[error(transparent)]
    Toml(#[from] toml::ser::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}
