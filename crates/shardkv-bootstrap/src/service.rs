use std::sync::Arc;

use serde_json::{json, Map, Value};
use shardkv_bucket::Master;
use shardkv_net::{EndpointTable, ServiceError, MASTER_GROUP};
use shardkv_store::Key;

fn missing_arg(name: &str) -> ServiceError {
    ServiceError::Handler(json!(format!("missing or invalid argument: {name}")))
}

fn arg_index(args: &[Value]) -> Result<String, ServiceError> {
    args.get(0)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing_arg("index"))
}

fn arg_key(args: &[Value], i: usize) -> Result<Key, ServiceError> {
    args.get(i).and_then(Key::from_value).ok_or_else(|| missing_arg("key"))
}

/// The bootstrap's C8 endpoint table: topology queries answered from an
/// in-memory [`Master`], plus `create_index`/`drop_index` fanned out to
/// every shard. Grounded on `pyshard/master/server.py`'s `BootstrapServer`.
pub fn build_endpoint_table(master: Arc<Master>) -> EndpointTable {
    let mut table = EndpointTable::new();

    {
        let master = master.clone();
        table.register(
            "get_shard",
            move |_chan, args, _kwargs| {
                let master = master.clone();
                async move {
                    let index = arg_index(&args)?;
                    let key = arg_key(&args, 1)?;
                    let (hash, client) = master.get_shard(&index, &key);
                    Ok(json!([hash, client.peer_addr().to_string()]))
                }
            },
            Vec::<String>::new(),
            false,
        );
    }

    {
        let master = master.clone();
        table.register(
            "get_map",
            move |_chan, _args, _kwargs| {
                let master = master.clone();
                async move {
                    let obj: Map<String, Value> = master
                        .get_map()
                        .into_iter()
                        .map(|(start, addr)| (format!("{start:.10}"), json!(addr.to_string())))
                        .collect();
                    Ok(Value::Object(obj))
                }
            },
            Vec::<String>::new(),
            false,
        );
    }

    {
        let master = master.clone();
        table.register(
            "create_index",
            move |_chan, args, _kwargs| {
                let master = master.clone();
                async move {
                    let index = arg_index(&args)?;
                    master
                        .create_index(&index)
                        .await
                        .map_err(|e| ServiceError::Handler(json!(e.to_string())))?;
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let master = master.clone();
        table.register(
            "drop_index",
            move |_chan, args, _kwargs| {
                let master = master.clone();
                async move {
                    let index = arg_index(&args)?;
                    master
                        .drop_index(&index)
                        .await
                        .map_err(|e| ServiceError::Handler(json!(e.to_string())))?;
                    Ok(Value::Null)
                }
            },
            vec![MASTER_GROUP.to_string()],
            false,
        );
    }

    {
        let master = master.clone();
        table.register(
            "stat",
            move |_chan, _args, _kwargs| {
                let master = master.clone();
                async move {
                    let mut shards = Vec::with_capacity(master.entries().len());
                    for entry in master.entries() {
                        let stat = entry
                            .client
                            .get_stat()
                            .await
                            .map_err(|e| ServiceError::Handler(json!(e.to_string())))?;
                        shards.push(json!({
                            "start": entry.start,
                            "name": entry.name,
                            "addr": entry.addr.to_string(),
                            "stat": stat,
                        }));
                    }
                    Ok(json!({ "shards": shards }))
                }
            },
            Vec::<String>::new(),
            false,
        );
    }

    table
}
