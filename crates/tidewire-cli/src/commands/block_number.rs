use super::Endpoint;

pub async fn run(endpoint: &Endpoint) -> Result<(), Box<dyn std::error::Error>> {
    let web3 = endpoint.connect()?;
    let number = web3.eth().block_number().await;
    web3.close().await;

    println!("{}", number?);
    Ok(())
}
