use serde_json::Value;

use super::Endpoint;

/// Parse the positional params argument. Absent means no params.
pub(crate) fn parse_params(params: Option<&str>) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let Some(raw) = params else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(params) => Ok(params),
        other => Err(format!("params must be a JSON array, got {other}").into()),
    }
}

pub async fn run(
    endpoint: &Endpoint,
    method: String,
    params: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = parse_params(params.as_deref())?;
    let web3 = endpoint.connect()?;

    let result = web3.call::<Value>(&method, params).await;
    web3.close().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
