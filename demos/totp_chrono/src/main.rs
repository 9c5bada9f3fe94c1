use chrono::offset;
use totp_core::{
    totp::Totp,
    uri_helper::build_provisioning_uri,
    Otp, Secret, SecretEncoding,
};
use tracing_subscriber::EnvFilter;

const SECRET: &str = "HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ";

pub fn main() -> anyhow::Result<()> {
    // RUST_LOG=totp_core=trace shows every time step verification looks at
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Initialize the TOTP with the defaults (SHA1 hash, 6-digits and 30 seconds period)
    let totp = Totp::new(Secret::new(SECRET, SecretEncoding::Base32));

    // Get seconds since Unix Epoch
    let now = u64::try_from(offset::Local::now().timestamp())?;

    let code = totp.generate(now)?;
    println!(
        "Code: {}, Remaining time: {}",
        code,
        totp.remaining_seconds(now)?
    );

    // Accept the previous and the next code as well
    let accepted = totp.verify(&code.to_string(), now, 1)?;
    println!("Verified: {accepted}");

    println!(
        "Provisioning URI: {}",
        build_provisioning_uri("john.doe@email.com", SECRET, 30, "ACME Co")
    );
    println!("Full URI: {}", totp.to_uri("john.doe@email.com", Some("ACME Co"))?);

    Ok(())
}
