//! Token sources and the reuse-until-expired caching decorator.

// self
use crate::{_prelude::*, auth::Token};

/// Boxed future returned by [`TokenSource::token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Arc<Token>>> + 'a + Send>>;

/// Anything able to produce a token on demand.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a token, fetching one if necessary.
	fn token(&self) -> TokenFuture<'_>;
}
impl<T> TokenSource for Arc<T>
where
	T: ?Sized + TokenSource,
{
	fn token(&self) -> TokenFuture<'_> {
		(**self).token()
	}
}

/// Always returns the same token, valid or not.
#[derive(Clone, Debug)]
pub struct StaticTokenSource(Arc<Token>);
impl StaticTokenSource {
	/// Wraps a fixed token.
	pub fn new(token: impl Into<Arc<Token>>) -> Self {
		Self(token.into())
	}
}
impl TokenSource for StaticTokenSource {
	fn token(&self) -> TokenFuture<'_> {
		let token = self.0.clone();

		Box::pin(async move { Ok(token) })
	}
}

/// Holds the last token from `source` and hands it out while it stays valid.
///
/// The lock only guards reads and writes of the held token; it is released while `source`
/// runs. Concurrent callers that find the held token expired may each call `source`, and the
/// last result to arrive is kept. Use a [`Credential`](crate::credential::Credential) when
/// refreshes must be serialized.
pub struct ReuseTokenSource<S> {
	held: Mutex<Option<Arc<Token>>>,
	source: S,
}
impl<S> ReuseTokenSource<S>
where
	S: TokenSource,
{
	/// Wraps `source`, optionally seeded with a previously obtained token.
	pub fn new(initial: Option<Token>, source: S) -> Self {
		Self { held: Mutex::new(initial.map(Arc::new)), source }
	}

	/// Currently held token, without validating or refreshing it.
	pub fn held(&self) -> Option<Arc<Token>> {
		self.held.lock().clone()
	}
}
impl<S> TokenSource for ReuseTokenSource<S>
where
	S: TokenSource,
{
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move {
			if let Some(token) = self.held().filter(|token| token.is_valid()) {
				return Ok(token);
			}

			let fresh = self.source.token().await?;

			*self.held.lock() = Some(fresh.clone());

			Ok(fresh)
		})
	}
}
impl<S> Debug for ReuseTokenSource<S> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReuseTokenSource").field("held", &self.held.lock().is_some()).finish()
	}
}
