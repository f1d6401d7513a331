// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use redstart::{
    router::{RequestHandler, Router},
    Method, Response, StatusCode,
};

use std::sync::Arc;

fn ok_handler() -> RequestHandler {
    Arc::new(|_request, _parameters| Response::builder(StatusCode::Ok).build())
}

fn build_router() -> Router {
    let mut router = Router::new();
    let routes = [
        "/",
        "/index",
        "/static/js/app",
        "/static/css/app",
        "/user/:name",
        "/user/:name/*action",
        "/posts/:id/comments/:comment",
    ];
    for route in &routes {
        router.add_route(Method::Get, route, ok_handler()).unwrap();
    }
    router
}

fn bench_route(c: &mut Criterion) {
    let router = build_router();

    c.bench_function("route literal", |b| {
        b.iter(|| router.route(Method::Get, black_box("/static/js/app")))
    });

    c.bench_function("route parameters", |b| {
        b.iter(|| router.route(Method::Get, black_box("/user/alice/greet")))
    });

    c.bench_function("route fallback", |b| {
        b.iter(|| router.route(Method::Get, black_box("/no/such/route")))
    });
}

criterion_group!(benches, bench_route);
criterion_main!(benches);
