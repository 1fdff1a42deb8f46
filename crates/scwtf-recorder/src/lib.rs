//! HTTP record/replay for scwtf acceptance tests
//!
//! A [`Recorder`] plugs into the provider wherever an
//! [`scwtf_cloud::HttpTransport`] is expected. Cassettes live under
//! `testdata/<test-name>.cassette`.

pub mod anonymize;
pub mod cassette;
pub mod error;
pub mod matcher;
pub mod recorder;

pub use cassette::{Cassette, Interaction, cassette_path};
pub use error::{RecorderError, Result};
pub use matcher::Matcher;
pub use recorder::{Recorder, RecorderMode};
