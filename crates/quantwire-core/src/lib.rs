//! # Quantwire Core
//!
//! Change-notification and lazy-recalculation primitives for the Quantwire
//! pricing framework.
//!
//! - **Observables**: [`observable::ObserverRegistry`] and the
//!   [`observable::Observable`]/[`observable::Observer`] traits
//! - **Handles**: relinkable, shared references that forward notifications
//! - **Lazy objects**: memoized calculations invalidated by upstream changes
//! - **Market data**: [`quote::SimpleQuote`] and the observable
//!   [`settings::Settings`] evaluation date
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quantwire_core::prelude::*;
//!
//! struct Square(Handle<dyn Quote>);
//!
//! impl Calculation for Square {
//!     type Output = f64;
//!
//!     fn name(&self) -> String {
//!         "Square".into()
//!     }
//!
//!     fn dependencies(&self) -> Vec<&dyn Observable> {
//!         vec![&self.0]
//!     }
//!
//!     fn perform_calculations(&self) -> QuantResult<f64> {
//!         let x = self.0.get_link()?.value()?;
//!         Ok(x * x)
//!     }
//! }
//!
//! let spot = Arc::new(SimpleQuote::new("spot", 3.0));
//! let target: Arc<dyn Quote> = spot.clone();
//! let square = LazyObject::new(Square(Handle::new(target)));
//!
//! assert_eq!(square.calculate().unwrap(), 9.0);
//! spot.set_value(4.0).unwrap();
//! assert!(square.is_dirty());
//! assert_eq!(square.calculate().unwrap(), 16.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod handle;
pub mod lazy;
pub mod observable;
pub mod quote;
pub mod settings;
pub mod time;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{QuantResult, QuantwireError};
    pub use crate::handle::Handle;
    pub use crate::lazy::{Calculation, ForwardPolicy, LazyObject, LazyOptions, LazyStats};
    pub use crate::observable::{
        downgrade_observer, Observable, ObservableId, Observer, ObserverRegistry, Payload,
    };
    pub use crate::quote::{Quote, SimpleQuote};
    pub use crate::settings::Settings;
    pub use crate::time::Date;
}

pub use error::{QuantResult, QuantwireError};
pub use handle::{Handle, Link};
pub use lazy::{
    is_recalculation_notice, Calculation, ForwardPolicy, LazyObject, LazyOptions, LazyStats,
    Revision,
};
pub use observable::{
    downgrade_observer, Observable, ObservableId, Observer, ObserverRegistry, Payload,
};
pub use quote::{Quote, SimpleQuote};
pub use settings::Settings;
pub use time::Date;
