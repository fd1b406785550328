//! A process-wide single-flight cache for reference data.
//!
//! The cache moves through three phases: `Empty`, `Loading` (one shared
//! in-flight load that every concurrent caller awaits) and `Ready` (an
//! immutable value). [`SingleFlight::invalidate`] resets it to `Empty`.

use std::{
  future::Future,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::future::{BoxFuture, FutureExt as _, Shared};

type SharedLoad<T, E> = Shared<BoxFuture<'static, Result<Arc<T>, Arc<E>>>>;

/// Observable state of a [`SingleFlight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Empty,
  Loading,
  Ready,
}

enum Slot<T, E> {
  Empty,
  Loading {
    generation: u64,
    load:       SharedLoad<T, E>,
  },
  Ready(Arc<T>),
}

struct State<T, E> {
  slot:       Slot<T, E>,
  /// Bumped for every load so a load that finishes after an invalidation
  /// cannot overwrite newer state.
  generation: u64,
}

pub struct SingleFlight<T, E> {
  state: Mutex<State<T, E>>,
}

impl<T, E> Default for SingleFlight<T, E> {
  fn default() -> Self {
    Self { state: Mutex::new(State { slot: Slot::Empty, generation: 0 }) }
  }
}

impl<T, E> SingleFlight<T, E>
where
  T: Send + Sync + 'static,
  E: Send + Sync + 'static,
{
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, State<T, E>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Return the cached value, joining an in-flight load or starting one with
  /// `load` if the cache is empty. A failed load leaves the cache empty so
  /// the next caller retries.
  pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<T>, Arc<E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let (generation, pending) = {
      let mut state = self.lock();
      match &state.slot {
        Slot::Ready(value) => return Ok(Arc::clone(value)),
        Slot::Loading { generation, load } => (*generation, load.clone()),
        Slot::Empty => {
          state.generation += 1;
          let generation = state.generation;
          let pending = load()
            .map(|res| res.map(Arc::new).map_err(Arc::new))
            .boxed()
            .shared();
          state.slot = Slot::Loading { generation, load: pending.clone() };
          (generation, pending)
        }
      }
    };

    let outcome = pending.await;

    let mut state = self.lock();
    let current = matches!(
      &state.slot,
      Slot::Loading { generation: g, .. } if *g == generation
    );
    if current {
      state.slot = match &outcome {
        Ok(value) => Slot::Ready(Arc::clone(value)),
        Err(_) => Slot::Empty,
      };
    }
    outcome
  }

  /// The cached value, if the cache is ready.
  pub fn peek(&self) -> Option<Arc<T>> {
    match &self.lock().slot {
      Slot::Ready(value) => Some(Arc::clone(value)),
      _ => None,
    }
  }

  pub fn phase(&self) -> Phase {
    match self.lock().slot {
      Slot::Empty => Phase::Empty,
      Slot::Loading { .. } => Phase::Loading,
      Slot::Ready(_) => Phase::Ready,
    }
  }

  /// Drop the cached value. An in-flight load still resolves for its own
  /// callers but is not stored.
  pub fn invalidate(&self) { self.lock().slot = Slot::Empty; }
}
