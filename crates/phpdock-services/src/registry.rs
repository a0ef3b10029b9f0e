//! The static service registry.
//!
//! Definitions are built once at first access and never mutated. Host
//! ports listed here are desired ports; the install flow remaps them
//! through the port resolver when they are taken.

use once_cell::sync::Lazy;
use phpdock_core::service::PostInstall;
use phpdock_core::{PortPair, ServiceCategory, ServiceConfig, ServiceDefinition, ServiceId};

static REGISTRY: Lazy<Vec<ServiceDefinition>> = Lazy::new(build_registry);

/// All known service definitions.
pub fn registry() -> &'static [ServiceDefinition] {
    &REGISTRY
}

/// Looks up a definition by id.
pub fn definition(id: &ServiceId) -> Option<&'static ServiceDefinition> {
    REGISTRY.iter().find(|def| &def.id == id)
}

/// Id of the reverse proxy service, which gets special treatment: starting
/// it triggers a best-effort routing-table sync.
pub const PROXY_SERVICE_ID: &str = "caddy";

fn service(
    id: &str,
    label: &str,
    category: ServiceCategory,
    image: &str,
    ports: Vec<PortPair>,
    binds: Vec<&str>,
    env: Vec<(&str, &str)>,
) -> ServiceDefinition {
    ServiceDefinition {
        id: ServiceId::new(id),
        label: label.to_string(),
        category,
        required: false,
        config: ServiceConfig {
            image: image.to_string(),
            container_name: format!("svc_{id}"),
            ports,
            binds: binds.into_iter().map(String::from).collect(),
            env: env
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cmd: None,
        },
        post_install: None,
    }
}

fn build_registry() -> Vec<ServiceDefinition> {
    let mut caddy = service(
        PROXY_SERVICE_ID,
        "Caddy",
        ServiceCategory::Proxy,
        "caddy:2-alpine",
        vec![PortPair::same(80), PortPair::same(443)],
        vec!["svc_caddy_data:/data", "svc_caddy_config:/config"],
        vec![],
    );
    caddy.required = true;

    let mut mysql = service(
        "mysql",
        "MySQL",
        ServiceCategory::Database,
        "mysql:8.4",
        vec![PortPair::same(3306)],
        vec!["svc_mysql_data:/var/lib/mysql"],
        vec![
            ("MYSQL_ROOT_PASSWORD", "phpdock"),
            ("MYSQL_DATABASE", "phpdock"),
        ],
    );
    mysql.post_install = Some(PostInstall {
        argv: vec![
            "sh".to_string(),
            "-c".to_string(),
            "until mysqladmin ping -h127.0.0.1 -uroot -pphpdock --silent; do sleep 1; done"
                .to_string(),
        ],
        message: "MySQL is ready. Root password: phpdock, default database: phpdock.".to_string(),
    });

    let mariadb = service(
        "mariadb",
        "MariaDB",
        ServiceCategory::Database,
        "mariadb:11",
        vec![PortPair::same(3306)],
        vec!["svc_mariadb_data:/var/lib/mysql"],
        vec![
            ("MARIADB_ROOT_PASSWORD", "phpdock"),
            ("MARIADB_DATABASE", "phpdock"),
        ],
    );

    let postgres = service(
        "postgres",
        "PostgreSQL",
        ServiceCategory::Database,
        "postgres:16-alpine",
        vec![PortPair::same(5432)],
        vec!["svc_postgres_data:/var/lib/postgresql/data"],
        vec![("POSTGRES_PASSWORD", "phpdock"), ("POSTGRES_DB", "phpdock")],
    );

    let redis = service(
        "redis",
        "Redis",
        ServiceCategory::Cache,
        "redis:7-alpine",
        vec![PortPair::same(6379)],
        vec!["svc_redis_data:/data"],
        vec![],
    );

    let meilisearch = service(
        "meilisearch",
        "Meilisearch",
        ServiceCategory::Search,
        "getmeili/meilisearch:v1.8",
        vec![PortPair::same(7700)],
        vec!["svc_meilisearch_data:/meili_data"],
        vec![("MEILI_NO_ANALYTICS", "true")],
    );

    let mailpit = service(
        "mailpit",
        "Mailpit",
        ServiceCategory::Mail,
        "axllent/mailpit",
        vec![PortPair::same(8025), PortPair::same(1025)],
        vec![],
        vec![],
    );

    let mut minio = service(
        "minio",
        "MinIO",
        ServiceCategory::Storage,
        "minio/minio",
        vec![PortPair::same(9000), PortPair::same(9001)],
        vec!["svc_minio_data:/data"],
        vec![
            ("MINIO_ROOT_USER", "phpdock"),
            ("MINIO_ROOT_PASSWORD", "phpdock123"),
        ],
    );
    minio.config.cmd = Some(vec![
        "server".to_string(),
        "/data".to_string(),
        "--console-address".to_string(),
        ":9001".to_string(),
    ]);

    vec![caddy, mysql, mariadb, postgres, redis, meilisearch, mailpit, minio]
}
