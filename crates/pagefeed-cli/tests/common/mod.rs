#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use assert_cmd::Command;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// A `pagefeed` command isolated to `dir` and pointed at `server`.
pub fn pagefeed_cmd(dir: &Path, server: &MockServer) -> Command {
    let config_dir = dir.join("config");
    std::fs::create_dir_all(&config_dir).expect("create config dir");
    let config = format!(
        "[api]\nbase_url = \"{}/api\"\nresource = \"character\"\ntimeout_secs = 5\n\n[images]\nretry_delay_ms = 10\n",
        server.uri()
    );
    std::fs::write(config_dir.join("config.toml"), config).expect("write config");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pagefeed"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env("PAGEFEED_CONFIG_DIR", &config_dir);
    cmd.env("PAGEFEED_DATA_DIR", dir.join("data"));
    cmd.env("PAGEFEED_CACHE_DIR", dir.join("cache"));
    cmd.env_remove("PAGEFEED_CONFIG");
    cmd.env("NO_COLOR", "1");
    cmd
}

fn page_body(server: &MockServer, names: &[(u64, &str)], next: Option<u32>) -> serde_json::Value {
    let results: Vec<_> = names
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "name": name,
                "species": "Human",
                "image": format!("{}/avatar/{id}.jpeg", server.uri()),
            })
        })
        .collect();
    json!({
        "info": {
            "count": 4,
            "pages": 2,
            "next": next.map(|n| format!("{}/api/character?page={n}", server.uri())),
            "prev": null,
        },
        "results": results,
    })
}

/// Mount a two-page `character` resource.
pub async fn mount_characters(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            server,
            &[(1, "Rick Sanchez"), (2, "Morty Smith")],
            Some(2),
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            server,
            &[(3, "Summer Smith"), (4, "Beth Smith")],
            None,
        )))
        .mount(server)
        .await;
}
