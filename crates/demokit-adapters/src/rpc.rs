//! RPC procedures
//!
//! Procedures are addressed by a dotted path (`product.byId`). Wrapping a
//! procedure in [`DemoProcedure`] routes every call through the interceptor
//! while keeping the [`Procedure`] interface, so routers never notice.

use async_trait::async_trait;
use demokit_core::{DemoError, Interceptor, OperationKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Read or write procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcedureKind {
    /// Read; keyed in the query namespace by its path
    #[default]
    Query,
    /// Write; keyed in the mutation namespace by its demo name
    Mutation,
}

/// Join router segments into a procedure path
#[must_use]
pub fn procedure_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// An RPC procedure
#[async_trait]
pub trait Procedure: Send + Sync {
    /// Input type
    type Input: Serialize + Send + 'static;
    /// Output type
    type Output: DeserializeOwned + Send;
    /// Error type; must be able to carry demo errors
    type Error: From<DemoError> + Send;

    /// Dotted procedure path
    fn path(&self) -> &str;

    /// Read or write
    fn kind(&self) -> ProcedureKind {
        ProcedureKind::Query
    }

    /// Execute the procedure
    async fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// Procedure routed through the interceptor
pub struct DemoProcedure<P> {
    inner: P,
    interceptor: Interceptor,
    demo_name: Option<String>,
}

impl<P: Procedure> DemoProcedure<P> {
    /// Wrap a procedure
    #[inline]
    #[must_use]
    pub fn new(inner: P, interceptor: Interceptor) -> Self {
        Self {
            inner,
            interceptor,
            demo_name: None,
        }
    }

    /// Demo name used as the key of a write procedure
    ///
    /// Without one, writes are keyed by their path.
    #[inline]
    #[must_use]
    pub fn demo_name(mut self, name: impl Into<String>) -> Self {
        self.demo_name = Some(name.into());
        self
    }

    /// Wrapped procedure
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Key this procedure resolves under
    #[must_use]
    pub fn operation_key(&self) -> OperationKey {
        match self.inner.kind() {
            ProcedureKind::Query => OperationKey::query(self.inner.path()),
            ProcedureKind::Mutation => {
                OperationKey::mutation(self.demo_name.as_deref().unwrap_or_else(|| self.inner.path()))
            }
        }
    }
}

impl<P> std::fmt::Debug for DemoProcedure<P>
where
    P: Procedure,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoProcedure")
            .field("path", &self.inner.path())
            .field("kind", &self.inner.kind())
            .field("demo_name", &self.demo_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: Procedure> Procedure for DemoProcedure<P> {
    type Input = P::Input;
    type Output = P::Output;
    type Error = P::Error;

    fn path(&self) -> &str {
        self.inner.path()
    }

    fn kind(&self) -> ProcedureKind {
        self.inner.kind()
    }

    async fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        let key = self.operation_key();
        let args = match serde_json::to_value(&input) {
            Ok(args) => args,
            Err(error) => {
                tracing::warn!(key = %key, %error, "procedure input is not representable as JSON");
                Value::Null
            }
        };
        self.interceptor
            .intercept(&key, args, move |_args| self.inner.call(input))
            .await
    }
}
