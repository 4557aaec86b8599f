/// Verbosity of one operation, handed down to every step it performs.
///
/// A verbose context narrates the pipeline at `INFO`; a quiet one at
/// `DEBUG`, so it still reaches a subscriber that asks for it. Warnings are
/// logged at `WARN` either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    verbose: bool,
}

impl Diagnostics {
    pub const fn new(verbose: bool) -> Diagnostics {
        Diagnostics { verbose }
    }

    pub const fn quiet() -> Diagnostics {
        Diagnostics::new(false)
    }

    pub const fn verbose() -> Diagnostics {
        Diagnostics::new(true)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Log pipeline narration at the level the context asks for.
macro_rules! narrate {
    ($diag:expr, $($arg:tt)+) => {
        if $diag.is_verbose() {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub(crate) use narrate;
