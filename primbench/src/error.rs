use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// No usable device, bad selection, or a missing/empty kernel module.
    Setup(String),
    /// The device compiler rejected a module; `log` is its diagnostic output.
    Build { module: String, log: String },
    /// A buffer could not be created.
    Allocation(String),
    /// Launch arguments do not match the entry point's signature.
    Argument { entry: String, reason: String },
    /// The device refused a dispatch.
    Launch { entry: String, reason: String },
    Transfer(String),
    /// A parallel result diverged from the oracle.
    Mismatch {
        variant: String,
        n: usize,
        iteration: usize,
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Setup(msg) => write!(f, "setup failed: {}", msg),
            Error::Build { module, log } => {
                write!(f, "build of kernel module `{}` failed", module)?;
                if !log.is_empty() {
                    write!(f, "\nLog:\n{}", log)?;
                }
                Ok(())
            }
            Error::Allocation(msg) => write!(f, "setup failed: buffer allocation: {}", msg),
            Error::Argument { entry, reason } => {
                write!(f, "bad arguments for `{}`: {}", entry, reason)
            }
            Error::Launch { entry, reason } => write!(f, "launch of `{}` failed: {}", entry, reason),
            Error::Transfer(msg) => write!(f, "buffer transfer failed: {}", msg),
            Error::Mismatch {
                variant,
                n,
                iteration,
                detail,
            } => write!(
                f,
                "{} result should be consistent with the oracle (n={}, iteration {}): {}",
                variant, n, iteration, detail
            ),
        }
    }
}

impl std::error::Error for Error {}
