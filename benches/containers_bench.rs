use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use keel::{cow_format, Array, CowString, HashMap, List};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_array_push(c: &mut Criterion) {
    c.bench_function("array_push_10k", |b| {
        b.iter(|| {
            let mut a = Array::new();
            for x in lcg(1).take(10_000) {
                a.push(x);
            }
            black_box(a)
        })
    });
}

fn bench_list_push_erase(c: &mut Criterion) {
    c.bench_function("list_push_erase_front_10k", |b| {
        b.iter_batched(
            || (0..10_000u64).collect::<List<u64>>(),
            |mut l| {
                while !l.is_empty() {
                    let at = l.begin();
                    black_box(l.erase(at));
                }
                l
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_map_insert(c: &mut Criterion) {
    c.bench_function("hashmap_insert_10k", |b| {
        let keys: Vec<_> = lcg(3).take(10_000).map(key).collect();
        b.iter_batched(
            || keys.clone(),
            |keys| {
                let mut m = HashMap::new();
                for (i, k) in keys.into_iter().enumerate() {
                    m.insert(k, i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_map_get_hit(c: &mut Criterion) {
    c.bench_function("hashmap_get_hit", |b| {
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        let m: HashMap<String, u64> = keys
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, k)| (k, i as u64))
            .collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()).unwrap());
        })
    });
}

fn bench_map_get_miss(c: &mut Criterion) {
    c.bench_function("hashmap_get_miss", |b| {
        let mut m = HashMap::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.insert(key(x), i as u64);
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_cow_clone_drop(c: &mut Criterion) {
    c.bench_function("cow_string_clone_drop", |b| {
        let s = CowString::from("a moderately long shared string value");
        b.iter(|| {
            let x = s.clone();
            black_box(&x);
            drop(x);
        })
    });
}

fn bench_cow_append(c: &mut Criterion) {
    c.bench_function("cow_string_append_1k", |b| {
        b.iter(|| {
            let mut s = CowString::new();
            for _ in 0..1_000 {
                s.append_str("word ");
            }
            black_box(s)
        })
    });
}

fn bench_format(c: &mut Criterion) {
    c.bench_function("cow_format_mixed", |b| {
        let mut it = lcg(5);
        b.iter(|| {
            let n = it.next().unwrap();
            black_box(cow_format!("%s=%08x (%.3f) %d%%", "key", n, n as f64 / 7.0, n as i64))
        })
    });
}

fn bench_glob(c: &mut Criterion) {
    c.bench_function("glob_match_star_heavy", |b| {
        let subject = "a".repeat(200) + "needle.txt";
        b.iter(|| {
            black_box(CowString::glob_match(
                subject.as_bytes(),
                b"*a*a*needle*.TXT",
                true,
            ))
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_array_push, bench_list_push_erase, bench_map_insert, bench_map_get_hit,
        bench_map_get_miss, bench_cow_clone_drop, bench_cow_append, bench_format, bench_glob
}
criterion_main!(benches);
