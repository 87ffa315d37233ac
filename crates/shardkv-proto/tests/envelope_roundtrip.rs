use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use serde_json::{Map, Value};
use shardkv_proto::RequestEnvelope;

#[derive(Clone, Debug)]
struct ArbitraryValue(Value);

impl Arbitrary for ArbitraryValue {
    fn arbitrary(g: &mut Gen) -> Self {
        let choice = u8::arbitrary(g) % 4;
        let v = match choice {
            0 => Value::Null,
            1 => Value::Bool(bool::arbitrary(g)),
            2 => Value::from(i64::arbitrary(g)),
            _ => Value::String(String::arbitrary(g)),
        };
        ArbitraryValue(v)
    }
}

#[quickcheck]
fn request_envelope_round_trips(endpoint: String, args: Vec<ArbitraryValue>) -> bool {
    let args: Vec<Value> = args.into_iter().map(|a| a.0).collect();
    let mut kwargs = Map::new();
    kwargs.insert("token".to_string(), Value::String("x".to_string()));

    let req = RequestEnvelope::new(endpoint).with_args(args).with_kwargs(kwargs);
    let decoded = RequestEnvelope::decode(&req.encode()).unwrap();
    decoded == req
}
