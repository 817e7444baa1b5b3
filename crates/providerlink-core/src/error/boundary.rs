/// Declare an error boundary and generate the matching `From` impl.
///
/// Transport failures, I/O failures, and cancellation all cross from the
/// transport crate into the resolver crate. Each crossing is declared once
/// here instead of scattering `map_err()` calls through the dispatch code.
///
/// # Syntax
///
/// ```ignore
/// error_boundary!(SourceError => TargetError, |err_var| {
///     // conversion logic returning TargetError
/// });
/// ```
///
/// # Example
///
/// ```
/// use providerlink_core::error_boundary;
/// use providerlink_core::cancel::Canceled;
///
/// #[derive(Debug, thiserror::Error)]
/// enum CallError {
///     #[error("operation canceled")]
///     Canceled,
///     #[error("io: {0}")]
///     Io(String),
/// }
///
/// error_boundary!(Canceled => CallError, |_e| CallError::Canceled);
/// error_boundary!(std::io::Error => CallError, |e| CallError::Io(e.to_string()));
///
/// fn guarded(signal: &providerlink_core::cancel::CancellationSignal) -> Result<(), CallError> {
///     signal.check()?;
///     Ok(())
/// }
///
/// let signal = providerlink_core::cancel::CancellationSignal::new();
/// signal.cancel();
/// assert!(matches!(guarded(&signal), Err(CallError::Canceled)));
/// ```
#[macro_export]
macro_rules! error_boundary {
    ($inner:ty => $outer:ty, |$err:ident| $body:expr) => {
        impl ::std::convert::From<$inner> for $outer {
            fn from($err: $inner) -> $outer {
                $body
            }
        }
    };
}
