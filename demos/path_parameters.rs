// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use redstart::{content_type, Method, PathParameters, Response, Server, StatusCode};

fn user(parameters: &PathParameters) -> Response {
    Response::builder(StatusCode::Ok)
        .content_type(content_type::PLAINTEXT)
        .body(format!("hi {}!", &parameters[0]))
        .build()
}

fn user_action(parameters: &PathParameters) -> Response {
    Response::builder(StatusCode::Ok)
        .content_type(content_type::PLAINTEXT)
        .body(format!("{} is {}", &parameters[0], &parameters[1]))
        .build()
}

fn fact(parameters: &PathParameters) -> Response {
    let n: u64 = match parameters[0].parse() {
        Ok(n) => n,
        Err(_) => return Response::builder(StatusCode::BadRequest).build(),
    };
    let result: u64 = (1..=n).product();
    Response::builder(StatusCode::Ok)
        .content_type(content_type::PLAINTEXT)
        .body(result.to_string())
        .build()
}

fn main() {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")
        .unwrap()
        .start()
        .unwrap();

    let mut server = Server::new();
    server.route(Method::Get, "/user/:name", user).unwrap();
    server
        .route(Method::Get, "/user/:name/*action", user_action)
        .unwrap();
    server.route(Method::Get, "/fact/:n", fact).unwrap();
    server.bind("127.0.0.1", 8080).unwrap();
    server.print_route_tree();

    if let Err(e) = server.serve() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
