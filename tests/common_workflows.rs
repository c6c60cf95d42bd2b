//! Common workflows through the `backend` facade.

use backend::prelude::*;
use serde_json::json;
use std::fs;

struct PostsController;

impl Controller for PostsController {
    fn execute(&self, route: &Route, _toolbox: &Toolbox) -> backend::Result<Response> {
        Ok(Response::ok().with_data(json!({
            "posts": route.arguments().len(),
            "action": route.action(),
        })))
    }
}

fn project(config: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("configs")).unwrap();
    fs::create_dir(dir.path().join("views")).unwrap();
    fs::write(dir.path().join("configs/default.toml"), config).unwrap();
    fs::write(
        dir.path().join("views/Json.view.toml"),
        "formats = [\"json\", \"application/json\"]\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_project_request_renders_json() {
    let dir = project("debug_level = 1\n");
    let config = Config::discover(dir.path(), SiteState::Production).unwrap();

    let kernel = Kernel::with_defaults();
    kernel.views.load_dir(dir.path().join("views")).unwrap();
    kernel
        .classes
        .register_controller("Application.Controllers.Posts", || PostsController);

    let request = Request::from_uri("GET", "posts/list/1/2.json").unwrap();
    let app = Application::new(&kernel, config, request);
    assert_eq!(app.debug_level(), 1);

    let mut out = Vec::new();
    app.run(&mut out).unwrap();
    let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(body, json!({"posts": 2, "action": "list"}));
}

#[test]
fn test_unknown_area_falls_back_to_generic_controller() {
    let dir = project("");
    let config = Config::discover(dir.path(), SiteState::Production).unwrap();
    let kernel = Kernel::with_defaults();
    kernel.views.load_dir(dir.path().join("views")).unwrap();

    let request = Request::from_uri("GET", "blog/show/12?format=json").unwrap();
    let app = Application::new(&kernel, config, request);

    let response = app.main(None).unwrap();
    assert_eq!(response.data["area"], "blog");
    assert_eq!(response.data["arguments"], json!(["12"]));
}

#[test]
fn test_unsupported_method_is_rejected() {
    assert!(Request::from_uri("UPDATE", "home").is_err());
}
