use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pagekit::{
    decode_component, encode_component, get_parameter_by_name, remove_url_parameter,
    update_url_parameter,
};

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz_";
const VALUE_CHARS: &[char] = &[
    'a', 'Z', '0', '9', ' ', '&', '=', '?', '#', '%', '+', ';', '/', '~', '\'', 'é', '漢', '🦀',
];
const BASES: &[&str] = &[
    "http://host/explore",
    "http://host/explore?keep=1",
    "http://host/explore?keep=1#panel",
    "/json/count?lang=en&time_lo=2020",
];

fn random_name(rng: &mut StdRng) -> String {
    let len = rng.random_range(1..=6);
    (0..len)
        .map(|_| NAME_ALPHABET[rng.random_range(0..NAME_ALPHABET.len())] as char)
        .collect()
}

fn random_value(rng: &mut StdRng) -> String {
    let len = rng.random_range(0..=12);
    (0..len)
        .map(|_| VALUE_CHARS[rng.random_range(0..VALUE_CHARS.len())])
        .collect()
}

#[test]
fn encoded_values_survive_update_then_get() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..500 {
        let base = BASES[rng.random_range(0..BASES.len())];
        let name = random_name(&mut rng);
        let value = random_value(&mut rng);

        let url = update_url_parameter(base, &name, &encode_component(&value));
        assert_eq!(
            get_parameter_by_name(&name, &url).as_deref(),
            Some(value.as_str()),
            "url={url}"
        );
        assert_eq!(url.matches('?').count(), 1, "url={url}");
        if base.ends_with("#panel") {
            assert!(url.ends_with("#panel"), "url={url}");
        }
    }
}

#[test]
fn remove_after_update_drops_only_that_parameter() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let base = BASES[rng.random_range(0..BASES.len())];
        let name = random_name(&mut rng);
        let value = random_value(&mut rng);

        let updated = update_url_parameter(base, &name, &encode_component(&value));
        let removed = remove_url_parameter(&updated, &name);
        assert_eq!(get_parameter_by_name(&name, &removed), None, "url={removed}");
        if name != "keep" && base.contains("keep=1") {
            assert_eq!(
                get_parameter_by_name("keep", &removed).as_deref(),
                Some("1"),
                "url={removed}"
            );
        }
    }
}

#[test]
fn updating_twice_keeps_a_single_pair() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let base = BASES[rng.random_range(0..BASES.len())];
        let name = random_name(&mut rng);
        let once = update_url_parameter(base, &name, "first");
        let twice = update_url_parameter(&once, &name, "second");
        let prefix = format!("{name}=");
        let occurrences = twice
            .split(['?', '&', '#'])
            .filter(|pair| pair.starts_with(&prefix))
            .count();
        assert_eq!(occurrences, 1, "url={twice}");
        assert_eq!(get_parameter_by_name(&name, &twice).as_deref(), Some("second"));
    }
}

#[test]
fn decode_inverts_encode() {
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..500 {
        let value = random_value(&mut rng);
        let encoded = encode_component(&value);
        assert!(
            encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"-_.!~*'()%".contains(&b)),
            "{encoded}"
        );
        assert_eq!(decode_component(&encoded), value);
    }
}
