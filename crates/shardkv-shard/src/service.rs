use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use shardkv_client::ShardClient;
use shardkv_engine::ShardEngine;
use shardkv_net::{EndpointTable, ServiceError, MASTER_GROUP};
use shardkv_store::Key;
use tokio::sync::Mutex;

use crate::error::{engine_error_to_service, missing_arg, store_error_to_service};

/// Everything a running shard service needs behind one handle: the engine
/// itself, the `Open`/`Locked` state machine driving `shardkv-net`'s
/// `is_locked` predicate, the single optional outbound relocation pipe, and
/// the shared secret `change_role` checks before letting a connection
/// elevate its own privilege group. Grounded on `pyshard/shard/server.py`'s
/// `ShardServer` instance attributes (`self._shard`, `self._locked`,
/// `self._pipe`).
pub struct ShardState {
    engine: Mutex<ShardEngine>,
    locked: AtomicBool,
    pipe: Mutex<Option<ShardClient>>,
    master_token: Option<String>,
}

impl ShardState {
    pub fn new(engine: ShardEngine, master_token: Option<String>) -> Arc<Self> {
        Arc::new(ShardState {
            engine: Mutex::new(engine),
            locked: AtomicBool::new(false),
            pipe: Mutex::new(None),
            master_token,
        })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Dumps the snapshot file, if one is configured, so the binary can call
    /// this once after `Server::serve` returns on a clean shutdown.
    pub async fn snapshot_on_shutdown(&self) -> Result<(), shardkv_store::StoreError> {
        self.engine.lock().await.store().stop()
    }
}

fn arg_index(args: &[Value]) -> Result<String, ServiceError> {
    args.get(0)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing_arg("index"))
}

fn arg_key(args: &[Value], i: usize) -> Result<Key, ServiceError> {
    args.get(i)
        .and_then(Key::from_value)
        .ok_or_else(|| missing_arg("key"))
}

/// Parses the `[ip, port]` pair `ShardClient::reloc` sends as its optional
/// third argument. Malformed input is treated as "no preference" rather
/// than an error, matching the other positional-arg helpers' leniency.
fn parse_addr_arg(value: &Value) -> Option<SocketAddr> {
    let pair = value.as_array()?;
    let ip: std::net::IpAddr = pair.first()?.as_str()?.parse().ok()?;
    let port: u16 = pair.get(1)?.as_u64()?.try_into().ok()?;
    Some(SocketAddr::new(ip, port))
}

fn key_to_json(key: Key) -> Value {
    serde_json::to_value(key).expect("Key always serializes")
}

/// Builds the full C6 endpoint table wired to `state`. The closure captured
/// by each registration clones `state`'s `Arc`, never its contents — the
/// shard-wide `processing_mutex` in `shardkv-net::Server` already serializes
/// every handler body, so the `tokio::sync::Mutex` around the engine here
/// is belt-and-suspenders against a future multi-worker queue change rather
/// than load-bearing today.
pub fn build_endpoint_table(state: Arc<ShardState>) -> EndpointTable {
    let mut table = EndpointTable::new();

    {
        let state = state.clone();
        table.register(
            "write",
            move |_chan, args, kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let hash = kwargs
                        .get("hash_")
                        .and_then(Value::as_f64)
                        .ok_or_else(|| missing_arg("hash_"))?;
                    let record = kwargs
                        .get("record")
                        .cloned()
                        .ok_or_else(|| missing_arg("record"))?;
                    let mut engine = state.engine.lock().await;
                    let written = engine
                        .write(&index, key, hash, record)
                        .map_err(engine_error_to_service)?;
                    Ok(json!(written))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "has",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let engine = state.engine.lock().await;
                    let has = engine
                        .store()
                        .has(&index, &key)
                        .map_err(store_error_to_service)?;
                    Ok(json!(has))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "read",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let engine = state.engine.lock().await;
                    let got = engine.read(&index, &key).map_err(engine_error_to_service)?;
                    Ok(got
                        .map(|r| serde_json::to_value(r).expect("Record always serializes"))
                        .unwrap_or(Value::Null))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "pop",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let mut engine = state.engine.lock().await;
                    let popped = engine.pop(&index, &key).map_err(engine_error_to_service)?;
                    Ok(popped
                        .map(|r| serde_json::to_value(r).expect("Record always serializes"))
                        .unwrap_or(Value::Null))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "remove",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let mut engine = state.engine.lock().await;
                    let freed = engine.remove(&index, &key).map_err(engine_error_to_service)?;
                    Ok(json!(freed))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "create_index",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let mut engine = state.engine.lock().await;
                    engine.create_index(&index).map_err(engine_error_to_service)?;
                    Ok(Value::Null)
                }
            },
            Vec::<String>::new(),
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "drop_index",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let mut engine = state.engine.lock().await;
                    engine.drop_index(&index).map_err(engine_error_to_service)?;
                    Ok(Value::Null)
                }
            },
            Vec::<String>::new(),
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "keys",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let engine = state.engine.lock().await;
                    let keys = engine.keys(&index).map_err(engine_error_to_service)?;
                    Ok(Value::Array(keys.into_iter().map(key_to_json).collect()))
                }
            },
            Vec::<String>::new(),
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "get_stat",
            move |_chan, _args, _kwargs| {
                let state = state.clone();
                async move {
                    let engine = state.engine.lock().await;
                    Ok(serde_json::to_value(engine.get_stat()).expect("ShardStat always serializes"))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "get_name",
            move |_chan, _args, _kwargs| {
                let state = state.clone();
                async move {
                    let engine = state.engine.lock().await;
                    Ok(json!(engine.name()))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "set_start",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let value = args.get(0).and_then(Value::as_f64).ok_or_else(|| missing_arg("value"))?;
                    state.engine.lock().await.set_start(value);
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "set_end",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let value = args.get(0).and_then(Value::as_f64).ok_or_else(|| missing_arg("value"))?;
                    state.engine.lock().await.set_end(value);
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "set_maxsize",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let value = args.get(0).and_then(Value::as_u64).ok_or_else(|| missing_arg("value"))?;
                    state
                        .engine
                        .lock()
                        .await
                        .set_maxsize(value)
                        .map_err(engine_error_to_service)?;
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "set_name",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let name = args.get(0).and_then(Value::as_str).ok_or_else(|| missing_arg("name"))?;
                    state.engine.lock().await.set_name(Some(name.to_string()));
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "update_distr",
            move |_chan, _args, _kwargs| {
                let state = state.clone();
                async move {
                    state.engine.lock().await.update_distr();
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    // Mutators above this line are reachable only from `master`, and are
    // never `requires_unlocked`: programming a shard's range is exactly
    // the operation `lock_shard` exists to protect while in progress.
    // Below this line are the data-adjacent endpoints: reachable from any
    // channel, but refused while `locked`.

    {
        let state = state.clone();
        table.register(
            "lock_shard",
            move |_chan, _args, _kwargs| {
                let state = state.clone();
                async move {
                    match state.locked.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(_) => Ok(Value::Null),
                        Err(_) => Err(ServiceError::Handler(json!("shard is already locked"))),
                    }
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "release_shard",
            move |_chan, _args, _kwargs| {
                let state = state.clone();
                async move {
                    match state.locked.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(_) => Ok(Value::Null),
                        Err(_) => Err(ServiceError::Handler(json!("shard is not locked"))),
                    }
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let state = state.clone();
        table.register(
            "change_role",
            move |chan, args, kwargs| {
                let state = state.clone();
                async move {
                    let role = args.get(0).and_then(Value::as_str).ok_or_else(|| missing_arg("role"))?;
                    let token = kwargs.get("token").and_then(Value::as_str);
                    match (&state.master_token, token) {
                        (None, _) => {
                            chan.set_permission_group(role.to_string());
                            Ok(Value::Null)
                        }
                        (Some(expected), Some(given)) if expected == given => {
                            chan.set_permission_group(role.to_string());
                            Ok(Value::Null)
                        }
                        _ => Err(ServiceError::AuthError("invalid role token".to_string())),
                    }
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "open_pipe",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let mut pipe_guard = state.pipe.lock().await;
                    if pipe_guard.is_some() {
                        return Err(ServiceError::PipeAlreadyOpen);
                    }
                    let host = args.get(0).and_then(Value::as_str).ok_or_else(|| missing_arg("host"))?;
                    let port = args.get(1).and_then(Value::as_u64).ok_or_else(|| missing_arg("port"))?;
                    let addr: SocketAddr = format!("{host}:{port}")
                        .parse()
                        .map_err(|_| missing_arg("host/port"))?;
                    let client = ShardClient::connect(addr)
                        .await
                        .map_err(|e| ServiceError::Handler(json!(e.to_string())))?;
                    *pipe_guard = Some(client);
                    Ok(Value::Null)
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "close_pipe",
            move |_chan, _args, _kwargs| {
                let state = state.clone();
                async move {
                    let mut pipe_guard = state.pipe.lock().await;
                    if pipe_guard.is_none() {
                        return Err(ServiceError::PipeMissing);
                    }
                    *pipe_guard = None;
                    Ok(Value::Null)
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    {
        let state = state.clone();
        table.register(
            "reloc",
            move |_chan, args, _kwargs| {
                let state = state.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let requested_addr = args.get(2).and_then(parse_addr_arg);

                    let pipe_guard = state.pipe.lock().await;
                    let pipe = pipe_guard.as_ref().ok_or(ServiceError::PipeMissing)?;
                    if let Some(requested) = requested_addr {
                        if requested != pipe.peer_addr() {
                            return Err(ServiceError::PipeMismatch);
                        }
                    }
                    let mut engine = state.engine.lock().await;
                    let written = engine
                        .reloc(&index, key, pipe)
                        .await
                        .map_err(|e| ServiceError::Handler(json!(e.to_string())))?;
                    Ok(json!(written))
                }
            },
            Vec::<String>::new(),
            true,
        );
    }

    table
}

/// Builds the endpoint table alongside the `is_locked` predicate
/// `shardkv_net::Server::new` needs, both sharing the same `state`.
pub fn endpoint_table_and_lock(
    state: Arc<ShardState>,
) -> (EndpointTable, impl Fn() -> bool + Send + Sync + 'static) {
    let is_locked_state = state.clone();
    (build_endpoint_table(state), move || is_locked_state.is_locked())
}
