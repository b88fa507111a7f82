//! Type forwarding, scopes and a callback-resolved cycle.

use std::sync::{Arc, OnceLock, Weak};

use wasla::prelude::*;

// === Capabilities ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

trait Repository: Send + Sync {
    fn find_user(&self, id: u64) -> String;
}

trait HealthCheck: Send + Sync {
    fn healthy(&self) -> bool;
}

// === Implementations ===

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Repository for Database {
    fn find_user(&self, id: u64) -> String {
        self.logger.log(&format!("SELECT * FROM users WHERE id = {id}"));
        format!("user {id} from {}", self.url)
    }
}

impl HealthCheck for Database {
    fn healthy(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Server and client point at each other; the server's link is set in a callback.
struct Server {
    client: OnceLock<Arc<Client>>,
}

struct Client {
    server: Weak<Server>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("wasla_container=debug")
        .init();

    let container = Container::builder().max_depth(64).build();

    container.register_instance(Arc::new(Config {
        database_url: "postgres://localhost/app".to_string(),
    }));

    container
        .register::<ConsoleLogger>(Scope::Singleton, |_| Ok(Arc::new(ConsoleLogger)))
        .implements::<dyn Logger>(|l| l as Arc<dyn Logger>);

    // One recipe, three capabilities, one shared instance per graph.
    container
        .register::<Database>(Scope::Shared, |resolution| {
            let config: Arc<Config> = resolution.resolve()?;
            let logger: Arc<dyn Logger> = resolution.resolve()?;
            Ok(Arc::new(Database {
                url: config.database_url.clone(),
                logger,
            }))
        })
        .implements::<dyn Repository>(|db| db as Arc<dyn Repository>)
        .implements_with::<dyn HealthCheck, _>(
            None,
            |db| db as Arc<dyn HealthCheck>,
            |_, check| {
                println!("health check ready: {}", check.healthy());
                Ok(())
            },
        );

    container
        .register::<Server>(Scope::Shared, |_| {
            Ok(Arc::new(Server {
                client: OnceLock::new(),
            }))
        })
        .on_resolved(|resolution, server| {
            let client: Arc<Client> = resolution.resolve()?;
            let _ = server.client.set(client);
            Ok(())
        });

    container.register::<Client>(Scope::Shared, |resolution| {
        let server: Arc<Server> = resolution.resolve()?;
        Ok(Arc::new(Client {
            server: Arc::downgrade(&server),
        }))
    });

    println!("{container:?}");

    let repository: Arc<dyn Repository> = container.resolve()?;
    println!("{}", repository.find_user(42));

    let health: Arc<dyn HealthCheck> = container.resolve()?;
    println!("healthy: {}", health.healthy());

    let server: Arc<Server> = container.resolve()?;
    let linked = server
        .client
        .get()
        .and_then(|client| client.server.upgrade())
        .is_some_and(|back| Arc::ptr_eq(&back, &server));
    println!("server and client linked: {linked}");

    match container.resolve::<dyn Fn() + Send + Sync>() {
        Err(e) => println!("\n{e}"),
        Ok(_) => println!("unexpected"),
    }

    Ok(())
}
