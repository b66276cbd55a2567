use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use eshop_backend::app::{ListParams, listing};
use eshop_backend::domain::{ListQuery, User, UserResponse};

fn project(user: &User) -> UserResponse {
    UserResponse::from(user)
}

fn users(n: usize) -> Vec<User> {
    (0..n)
        .map(|i| {
            let domain = if i % 3 == 0 { "example.com" } else { "test.io" };
            User::new(
                format!("user-{i}"),
                format!("User {}", n - i),
                format!("user{i}@{domain}"),
                "$argon2id$placeholder".to_string(),
            )
        })
        .collect()
}

fn bench_listing(c: &mut Criterion) {
    let query = ListQuery {
        page_number: 2,
        page_size: 20,
        search: Some("email:test".to_string()),
        sort: Some("name:asc".to_string()),
    };
    let params = ListParams::try_from(&query).expect("valid query");

    let mut group = c.benchmark_group("list_users");
    for size in [100usize, 1_000, 10_000] {
        let records = users(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| {
                let page = listing::list(black_box(records.clone()), &params, project);
                black_box(page)
            })
        });
    }
    group.finish();
}

fn bench_query_parsing(c: &mut Criterion) {
    let query = ListQuery {
        search: Some("name:alice".to_string()),
        sort: Some("email:desc".to_string()),
        ..ListQuery::default()
    };

    c.bench_function("parse_list_query", |b| {
        b.iter(|| ListParams::try_from(black_box(&query)))
    });
}

criterion_group!(benches, bench_listing, bench_query_parsing);
criterion_main!(benches);
