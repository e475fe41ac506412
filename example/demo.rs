use gencache::{Cache, Fetch};
use std::convert::Infallible;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const ROTATION_INTERVAL_MS: u64 = 500;
const LOAD_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Default)]
struct Account {
    id: u64,
    owner: String,
}

impl Fetch for Account {
    type Key = u64;
    type Error = Infallible;

    async fn fetch(&self, id: &u64) -> Result<Self, Infallible> {
        println!("  (fetching account {} from the database)", id);
        tokio::time::sleep(Duration::from_millis(LOAD_DELAY_MS)).await;
        Ok(Account {
            id: *id,
            owner: format!("owner_{}", id),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cache = Cache::new(Duration::from_millis(ROTATION_INTERVAL_MS));
    let mut account = Account::default();

    println!("Loading account 1...");
    cache.remember(&mut account, &1).await?;
    println!("Got: {:?}", account);

    println!("Loading account 1 again (should be cached)...");
    cache.remember(&mut account, &1).await?;
    println!("Got: {:?}", account);

    println!("Cache size: {}", cache.size());

    cache.delete::<Account>(&1);
    match cache.remember(&mut account, &1).await {
        Ok(()) => println!("Unexpected value after delete: {:?}", account),
        Err(e) => println!("After delete: {}", e),
    }

    println!("Loading several accounts concurrently:");
    let mut a = Account::default();
    let mut b = Account::default();
    let mut c = Account::default();
    let (ra, rb, rc) = tokio::join!(
        cache.remember(&mut a, &10),
        cache.remember(&mut b, &10),
        cache.remember(&mut c, &20),
    );
    ra?;
    rb?;
    rc?;
    println!(
        "Got: {}={} {}={} {}={}",
        a.id, a.owner, b.id, b.owner, c.id, c.owner
    );
    println!("Cache size with multiple keys: {}", cache.size());

    println!("Waiting for two rotations...");
    tokio::time::sleep(Duration::from_millis(2 * ROTATION_INTERVAL_MS)).await;
    println!("Cache size after rotations: {}", cache.size());

    cache.remember(&mut account, &1).await?;
    println!("Account 1 is fetchable again: {:?}", account);

    cache.delete_all();
    println!("Cache size after clear: {}", cache.size());

    Ok(())
}
