//! Mount option sanitization for storage backends.
//!
//! A [`MountOptsMask`] describes which options a caller may pass for a given
//! mount type, which defaults apply, which legacy keys are renamed, and which
//! options are required. [`resolve`] applies a mask to raw user options and
//! reports every violation at once; [`codec`] converts the result to and from
//! the `key=value,flag` string handed to `mount -o`.

pub mod codec;
pub mod coerce;
pub mod config;
pub mod error;
pub mod mask;
pub mod resolve;
pub mod validate;

pub use coerce::{Coercer, OptionValue, coerce_to_string};
pub use error::{ConsistencyIssue, MaskError, ResolveError, Violation};
pub use mask::{MaskBuilder, MountOptsMask, SLOPPY_MOUNT_KEY};
pub use resolve::{MountOpts, RawUserOptions, resolve};
pub use validate::{BuiltinValidator, OptionValidator, SharedValidator};
