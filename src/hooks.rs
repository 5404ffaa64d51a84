use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Map, Value};
use yew::prelude::*;

use crate::cache::{collection_key, document_key, QueryCache};
use crate::gateway::{Constraint, Gateway, Record};

/// Shared services for the whole view tree. Provided once at the root;
/// every binding pulls it from context, so tests and alternate shells can
/// inject their own cache instance.
#[derive(Clone)]
pub struct AppContext {
    pub gateway: Rc<Gateway>,
    pub cache: QueryCache,
}

impl PartialEq for AppContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.gateway, &other.gateway) && self.cache.ptr_eq(&other.cache)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T: Clone + PartialEq> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T: Clone + PartialEq> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }
}

/// Monotonic token per binding instance. A fetch resolution whose token
/// has been superseded must not touch state: parameters changed while the
/// request was in flight.
#[derive(Debug, Default)]
pub(crate) struct Generation(Cell<u64>);

impl Generation {
    pub fn begin(&self) -> u64 {
        let token = self.0.get().wrapping_add(1);
        self.0.set(token);
        token
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.0.get() == token
    }
}

fn run_collection_query(
    ctx: AppContext,
    collection: String,
    constraints: Vec<Constraint>,
    state: UseStateHandle<QueryState<Vec<Record>>>,
    generation: Rc<RefCell<Generation>>,
    bypass_cache: bool,
) {
    let token = generation.borrow().begin();
    let key = collection_key(&collection, &constraints);
    if !bypass_cache {
        if let Some(records) = ctx.cache.get(&key) {
            state.set(QueryState {
                data: Some(records),
                loading: false,
                error: None,
            });
            return;
        }
    }
    state.set(QueryState {
        data: (*state).data.clone(),
        loading: true,
        error: None,
    });
    wasm_bindgen_futures::spawn_local(async move {
        let result = ctx.gateway.read_many(&collection, &constraints).await;
        if !generation.borrow().is_current(token) {
            return;
        }
        match result {
            Ok(records) => {
                ctx.cache.put(&key, records.clone());
                state.set(QueryState {
                    data: Some(records),
                    loading: false,
                    error: None,
                });
            }
            Err(err) => state.set(QueryState {
                data: (*state).data.clone(),
                loading: false,
                error: Some(err.to_string()),
            }),
        }
    });
}

fn run_document_query(
    ctx: AppContext,
    collection: String,
    id: String,
    state: UseStateHandle<QueryState<Option<Record>>>,
    generation: Rc<RefCell<Generation>>,
    bypass_cache: bool,
) {
    let token = generation.borrow().begin();
    let key = document_key(&collection, &id);
    if !bypass_cache {
        if let Some(records) = ctx.cache.get(&key) {
            state.set(QueryState {
                data: Some(records.into_iter().next()),
                loading: false,
                error: None,
            });
            return;
        }
    }
    state.set(QueryState {
        data: (*state).data.clone(),
        loading: true,
        error: None,
    });
    wasm_bindgen_futures::spawn_local(async move {
        let result = ctx.gateway.read_one(&collection, &id).await;
        if !generation.borrow().is_current(token) {
            return;
        }
        match result {
            Ok(record) => {
                ctx.cache.put(&key, record.clone().into_iter().collect());
                state.set(QueryState {
                    data: Some(record),
                    loading: false,
                    error: None,
                });
            }
            Err(err) => state.set(QueryState {
                data: (*state).data.clone(),
                loading: false,
                error: Some(err.to_string()),
            }),
        }
    });
}

#[derive(Clone, PartialEq)]
pub struct UseCollectionHandle {
    pub state: QueryState<Vec<Record>>,
    /// Forces a gateway call, bypassing the cache read (the result still
    /// repopulates the cache).
    pub refetch: Callback<()>,
}

/// Cached fetch-on-change binding for a collection query. Reruns whenever
/// (collection, constraints) change by value; a new list instance with
/// equal content reuses the existing state and cache entry.
#[hook]
pub fn use_collection(collection: &str, constraints: Vec<Constraint>) -> UseCollectionHandle {
    let ctx = use_context::<AppContext>().expect("AppContext no montado");
    let state = use_state_eq(QueryState::<Vec<Record>>::default);
    let generation = use_mut_ref(Generation::default);

    {
        let ctx = ctx.clone();
        let state = state.clone();
        let generation = generation.clone();
        use_effect_with(
            (collection.to_owned(), constraints.clone()),
            move |(collection, constraints): &(String, Vec<Constraint>)| {
                run_collection_query(
                    ctx,
                    collection.clone(),
                    constraints.clone(),
                    state,
                    generation,
                    false,
                );
                || ()
            },
        );
    }

    let refetch = {
        let collection = collection.to_owned();
        let state = state.clone();
        Callback::from(move |_| {
            run_collection_query(
                ctx.clone(),
                collection.clone(),
                constraints.clone(),
                state.clone(),
                generation.clone(),
                true,
            );
        })
    };

    UseCollectionHandle {
        state: (*state).clone(),
        refetch,
    }
}

#[derive(Clone, PartialEq)]
pub struct UseDocumentHandle {
    /// `Some(None)` means loaded but absent; absence is not an error.
    pub state: QueryState<Option<Record>>,
    pub refetch: Callback<()>,
}

#[hook]
pub fn use_document(collection: &str, id: &str) -> UseDocumentHandle {
    let ctx = use_context::<AppContext>().expect("AppContext no montado");
    let state = use_state_eq(QueryState::<Option<Record>>::default);
    let generation = use_mut_ref(Generation::default);

    {
        let ctx = ctx.clone();
        let state = state.clone();
        let generation = generation.clone();
        use_effect_with(
            (collection.to_owned(), id.to_owned()),
            move |(collection, id): &(String, String)| {
                run_document_query(ctx, collection.clone(), id.clone(), state, generation, false);
                || ()
            },
        );
    }

    let refetch = {
        let collection = collection.to_owned();
        let id = id.to_owned();
        let state = state.clone();
        Callback::from(move |_| {
            run_document_query(
                ctx.clone(),
                collection.clone(),
                id.clone(),
                state.clone(),
                generation.clone(),
                true,
            );
        })
    };

    UseDocumentHandle {
        state: (*state).clone(),
        refetch,
    }
}

/// Live subscription binding. No caching: subscriptions are inherently
/// fresh. The previous watch is torn down (handle dropped) before a new
/// one opens, so a stale subscription can never update state after its
/// target changed.
#[hook]
pub fn use_watch_collection(
    collection: &str,
    constraints: Vec<Constraint>,
) -> QueryState<Vec<Record>> {
    let ctx = use_context::<AppContext>().expect("AppContext no montado");
    let state = use_state_eq(QueryState::<Vec<Record>>::default);

    {
        let state = state.clone();
        use_effect_with(
            (collection.to_owned(), constraints),
            move |(collection, constraints): &(String, Vec<Constraint>)| {
                let on_change = {
                    let state = state.clone();
                    Callback::from(move |records: Vec<Record>| {
                        state.set(QueryState {
                            data: Some(records),
                            loading: false,
                            error: None,
                        });
                    })
                };
                let handle = ctx
                    .gateway
                    .watch_collection(collection, constraints, on_change);
                move || handle.unsubscribe()
            },
        );
    }

    (*state).clone()
}

#[hook]
pub fn use_watch_document(collection: &str, id: &str) -> QueryState<Option<Record>> {
    let ctx = use_context::<AppContext>().expect("AppContext no montado");
    let state = use_state_eq(QueryState::<Option<Record>>::default);

    {
        let state = state.clone();
        use_effect_with(
            (collection.to_owned(), id.to_owned()),
            move |(collection, id): &(String, String)| {
                let on_change = {
                    let state = state.clone();
                    Callback::from(move |record: Option<Record>| {
                        state.set(QueryState {
                            data: Some(record),
                            loading: false,
                            error: None,
                        });
                    })
                };
                let handle = ctx.gateway.watch_document(collection, id, on_change);
                move || handle.unsubscribe()
            },
        );
    }

    (*state).clone()
}

#[allow(unused)]
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create {
        collection: String,
        fields: Map<String, Value>,
    },
    Update {
        collection: String,
        id: String,
        fields: Map<String, Value>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl Mutation {
    pub fn collection(&self) -> &str {
        match self {
            Mutation::Create { collection, .. }
            | Mutation::Update { collection, .. }
            | Mutation::Delete { collection, .. } => collection,
        }
    }
}

#[allow(unused)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationResult {
    pub created_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, PartialEq)]
pub struct UseMutationHandle {
    pub run: Callback<Mutation>,
    pub running: bool,
    pub error: Option<String>,
}

/// CRUD binding: success invalidates every cache entry of the affected
/// collection before settling; failure leaves the cache untouched and
/// surfaces the error message.
#[hook]
pub fn use_mutation(on_settled: Callback<MutationResult>) -> UseMutationHandle {
    let ctx = use_context::<AppContext>().expect("AppContext no montado");
    let running = use_state_eq(|| false);
    let error = use_state_eq(|| None::<String>);

    let run = {
        let running = running.clone();
        let error = error.clone();
        Callback::from(move |mutation: Mutation| {
            running.set(true);
            error.set(None);
            let ctx = ctx.clone();
            let running = running.clone();
            let error = error.clone();
            let on_settled = on_settled.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let collection = mutation.collection().to_owned();
                let outcome = match mutation {
                    Mutation::Create { collection, fields } => {
                        ctx.gateway.create(&collection, &fields).await.map(Some)
                    }
                    Mutation::Update {
                        collection,
                        id,
                        fields,
                    } => ctx.gateway.update(&collection, &id, &fields).await.map(|_| None),
                    Mutation::Delete { collection, id } => {
                        ctx.gateway.delete(&collection, &id).await.map(|_| None)
                    }
                };
                match outcome {
                    Ok(created_id) => {
                        ctx.cache.invalidate_collection(&collection);
                        running.set(false);
                        on_settled.emit(MutationResult {
                            created_id,
                            error: None,
                        });
                    }
                    Err(err) => {
                        let message = err.to_string();
                        running.set(false);
                        error.set(Some(message.clone()));
                        on_settled.emit(MutationResult {
                            created_id: None,
                            error: Some(message),
                        });
                    }
                }
            });
        })
    };

    UseMutationHandle {
        run,
        running: *running,
        error: (*error).clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_fetch_tokens_are_discarded() {
        let generation = Generation::default();
        // fetch A starts, then parameters change and fetch B starts
        let a = generation.begin();
        let b = generation.begin();
        // A resolves late: must not be applied
        assert!(!generation.is_current(a));
        // B resolves: applied
        assert!(generation.is_current(b));
    }

    #[test]
    fn refetch_after_resolution_supersedes_again() {
        let generation = Generation::default();
        let a = generation.begin();
        assert!(generation.is_current(a));
        let b = generation.begin();
        assert!(!generation.is_current(a));
        assert!(generation.is_current(b));
    }

    #[test]
    fn mutation_exposes_its_target_collection() {
        let m = Mutation::Delete {
            collection: "readings".into(),
            id: "r1".into(),
        };
        assert_eq!(m.collection(), "readings");
    }
}
