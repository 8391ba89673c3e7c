// self
use crate::{
	_prelude::*,
	dispatch::RequestDescriptor,
	obs::{self, OpKind, OpOutcome},
};

/// Future returned by [`OpSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span + counter pair covering one client operation.
///
/// [`start`](Self::start) counts the attempt, [`finish`](Self::finish) counts the outcome and
/// stamps it onto the span's `outcome` field.
#[derive(Clone, Debug)]
pub struct OpSpan {
	kind: OpKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span named `bearer_client.op` for `kind` at `stage`.
	pub fn start(kind: OpKind, stage: &'static str) -> Self {
		obs::record_op_outcome(kind, OpOutcome::Attempt);

		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_client.op",
				op = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Opens a dispatch span carrying the request's method, target path, and attempt index.
	pub fn request(descriptor: &RequestDescriptor) -> Self {
		const KIND: OpKind = OpKind::Dispatch;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_client.op",
				op = KIND.as_str(),
				stage = "send",
				method = %descriptor.method(),
				path = descriptor.target(),
				attempt = descriptor.attempt(),
				outcome = tracing::field::Empty,
			);

			Self { kind: KIND, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = descriptor;

			Self { kind: KIND }
		}
	}

	/// Operation kind this span covers.
	pub fn kind(&self) -> OpKind {
		self.kind
	}

	/// Records an intermediate or terminal outcome.
	pub fn record(&self, outcome: OpOutcome) {
		obs::record_op_outcome(self.kind, outcome);

		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());
	}

	/// Records the terminal outcome of `result`.
	pub fn finish<T, E>(&self, result: &Result<T, E>) {
		self.record(if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });
	}

	/// Instruments `fut` without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
