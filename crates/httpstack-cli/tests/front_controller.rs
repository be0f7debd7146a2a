// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use httpstack::{Phase, Request};
use httpstack_cli::commands::render::render;
use httpstack_cli::App;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const LAYOUT: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{ title }}</title></head>
<body>
<header>{{ site_name }}</header>
<main data-key="view"></main>
</body>
</html>"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "views/templates/base.html", LAYOUT);
    write(
        root,
        "views/routes/home.html",
        "<html><body><h1>Welcome</h1><p>at {{ path }}</p></body></html>",
    );
    write(
        root,
        "views/routes/about.html",
        r#"<html><head><link rel="stylesheet" href="css/about.css"></head><body><h1>{{ title }}</h1><p>{{ lead }}</p></body></html>"#,
    );
    write(
        root,
        "routes/10-middleware.toml",
        "[[route]]\nmethod = \"ANY\"\nphase = \"before\"\npattern = \"*\"\nhandlers = [\"template@init\"]\n",
    );
    write(
        root,
        "routes/20-pages.toml",
        "[[route]]\npattern = \"/\"\nhandlers = [\"page@show\"]\n\n\
         [[route]]\npattern = \"/{page}\"\nhandlers = [\"page@show\"]\n",
    );
    write(root, "data/template/site.json", r#"{"site_name": "Demo Site", "title": "Demo"}"#);
    write(
        root,
        "data/pages/about.xml",
        "<page><title>About us</title><lead>Who we are</lead></page>",
    );
    write(root, "public/css/site.css", "body { margin: 0 }");
    write(root, "assets.json", r#"[{"type": "css", "filename": "site"}]"#);
    dir
}

#[test]
fn test_renders_page_with_layout_data_and_assets() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/about"));

    assert_eq!(response.status(), 200);
    assert!(response.is_sent());
    assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));

    let body = response.body();
    assert!(body.contains("<title>About us</title>"), "{}", body);
    assert!(body.contains("<header>Demo Site</header>"));
    assert!(body.contains("<p>Who we are</p>"));
    assert!(body.contains(r#"href="/public/css/site.css""#));
    assert!(body.contains(r#"href="/public/css/about.css""#));
}

#[test]
fn test_root_path_renders_home_view() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/"));

    assert_eq!(response.status(), 200);
    assert!(response.body().contains("<h1>Welcome</h1>"));
    assert!(response.body().contains("<p>at /</p>"));
    assert!(response.body().contains("<title>Demo</title>"));
}

#[test]
fn test_requests_do_not_share_layouts() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let first = app.handle(&Request::new("GET", "/about"));
    let second = app.handle(&Request::new("GET", "/about"));

    assert_eq!(first.body(), second.body());
    assert_eq!(second.body().matches("Who we are").count(), 1);
    assert!(!app.container().has(httpstack_cli::controllers::LAYOUT));
}

#[test]
fn test_missing_view_is_404() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/missing"));

    assert_eq!(response.status(), 404);
    assert!(response.body().contains("Not found"));
}

#[test]
fn test_layout_is_not_a_page() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/base"));

    assert_eq!(response.status(), 404);
    assert_eq!(response.body().matches("data-key=\"view\"").count(), 0);
}

#[test]
fn test_public_file_name_is_not_a_page() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/site.css"));

    assert_eq!(response.status(), 404);
    assert!(response.body().contains("Not found"));
}

#[test]
fn test_unrouted_method_is_404() {
    let dir = project();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("POST", "/about"));

    assert_eq!(response.status(), 404);
    assert!(response.body().contains("No route for POST /about"));
}

#[test]
fn test_missing_layout_is_500() {
    let dir = project();
    fs::remove_file(dir.path().join("views/templates/base.html")).unwrap();
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/about"));

    assert_eq!(response.status(), 500);
    assert!(response.body().contains("no base layout"));
}

#[test]
fn test_route_files_accumulate() {
    let dir = project();
    write(
        dir.path(),
        "routes/30-audit.toml",
        "[[route]]\nmethod = \"ANY\"\nphase = \"before\"\npattern = \"*\"\nhandlers = [\"audit@log\"]\n",
    );
    let app = App::bootstrap(dir.path()).unwrap();
    let routes = app.router().routes();

    let before: Vec<_> = routes.iter().filter(|r| r.phase == Phase::Before).collect();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].handlers, ["template@init", "audit@log"]);

    // The unregistered audit controller fails in the before phase only.
    let response = app.handle(&Request::new("GET", "/about"));
    assert_eq!(response.status(), 200);
}

#[test]
fn test_abort_policy_stops_after_failed_before() {
    let dir = project();
    write(dir.path(), "app.toml", "[app]\nabort_on_before_error = true\n");
    write(
        dir.path(),
        "routes/30-audit.toml",
        "[[route]]\nmethod = \"ANY\"\nphase = \"before\"\npattern = \"*\"\nhandlers = [\"audit@log\"]\n",
    );
    let app = App::bootstrap(dir.path()).unwrap();
    let response = app.handle(&Request::new("GET", "/about"));

    assert_eq!(response.status(), 404);
    assert!(response.body().contains("audit"));
}

#[test]
fn test_page_row_from_database() {
    let dir = project();
    let conn = rusqlite::Connection::open(dir.path().join("data/site.db")).unwrap();
    conn.execute_batch(
        "CREATE TABLE pages (slug TEXT, lead TEXT);
         INSERT INTO pages VALUES ('about', 'From the database');",
    )
    .unwrap();
    drop(conn);
    write(dir.path(), "app.toml", "[database]\npath = \"data/site.db\"\n");

    let app = App::bootstrap(dir.path()).unwrap();
    let body = app.handle(&Request::new("GET", "/about")).body().to_string();
    assert!(body.contains("<p>From the database</p>"), "{}", body);
}

#[test]
fn test_render_command_splits_query() {
    let dir = project();
    let response = render(dir.path(), "get", "/about?ref=home").unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.body().contains("About us"));
}
