//! End-to-end substitution scenarios

use pretty_assertions::assert_eq;
use refsub_core::{
    parse_references, parse_variables, record, AsContext, Config, DataSource, ErrorKind, FileStore,
    KvStore, MapEnv, Mapping, Replacer, StoreOptions, Value,
};

struct Bar {
    name: String,
    profile: String,
}

struct Foo {
    name: String,
    bar: Bar,
}

record!(Bar { name, profile });
record!(Foo { name, bar });

fn replacer(vars: &[(&str, &str)]) -> Replacer {
    Replacer::new().with_env(vars.iter().copied().collect::<MapEnv>())
}

#[test]
fn self_replacement_resolves_context_and_environment() {
    let mut foo = Foo {
        name: "foo".into(),
        bar: Bar {
            name: "my name is ${BAR}".into(),
            profile: "${name}-bar".into(),
        },
    };

    replacer(&[("BAR", "bar")]).replace_self(&mut foo).unwrap();

    assert_eq!(foo.name, "foo");
    assert_eq!(foo.bar.name, "my name is bar");
    assert_eq!(foo.bar.profile, "foo-bar");
}

#[test]
fn matcher_yields_tokens_in_order() {
    let tokens = parse_variables("the-${FOO}-${BAR}-env", Replacer::new().pattern());

    assert_eq!(tokens.len(), 2);
    assert_eq!(&tokens[0][1], "FOO");
    assert_eq!(&tokens[1][1], "BAR");
    assert_eq!(&tokens[0][0], "${FOO}");
}

#[test]
fn templates_without_tokens_are_unchanged() {
    let foo = Foo {
        name: "foo".into(),
        bar: Bar {
            name: String::new(),
            profile: String::new(),
        },
    };
    let r = replacer(&[]);

    for template in ["", "plain", "$name", "{name}", "$ {name}", "${name"] {
        assert_eq!(r.replace_string_variables(template, &foo), template);
    }
}

#[test]
fn resolution_is_idempotent() {
    let foo = Foo {
        name: "foo".into(),
        bar: Bar {
            name: "n".into(),
            profile: "p".into(),
        },
    };
    let r = replacer(&[]);

    let once = r.replace_string_variables("${name}/${bar.profile}", &foo);
    assert_eq!(once, "foo/p");
    assert_eq!(r.replace_string_variables(&once, &foo), once);
}

#[test]
fn context_wins_over_environment() {
    let foo = Foo {
        name: "context".into(),
        bar: Bar {
            name: String::new(),
            profile: String::new(),
        },
    };

    let resolved = replacer(&[("NAME", "env"), ("name", "env")]).replace_string_variables("${name}", &foo);

    assert_eq!(resolved, "context");
}

#[test]
fn failing_prefix_fails_every_extension() {
    let foo = Foo {
        name: "foo".into(),
        bar: Bar {
            name: "n".into(),
            profile: "p".into(),
        },
    };

    let paths: [&[&str]; 3] = [&["missing"], &["missing", "name"], &["missing", "name", "deeper"]];
    for path in paths {
        let err = parse_references(foo.as_context(), path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PathNotFound);
    }
}

#[test]
fn mapping_traversal_reaches_innermost_string() {
    let config = Config::from_yaml(
        r#"
name: outer
a:
  b:
    c:
      d: "${name}-${HOME_DIR}"
"#,
    )
    .unwrap();
    let mut root = config.as_mapping().clone();

    replacer(&[("HOME_DIR", "/home/app")])
        .replace_map_self(&mut root)
        .unwrap();

    let value = Value::Mapping(root);
    assert_eq!(value.get_path("a.b.c.d").unwrap().as_str(), Some("outer-/home/app"));
}

#[test]
fn declared_order_decides_what_a_string_sees() {
    struct Forward {
        a: String,
        b: String,
    }
    struct Backward {
        b: String,
        a: String,
    }
    record!(Forward { a, b });
    record!(Backward { b, a });

    let r = replacer(&[]);

    // `a` is visited before `b`, so it reads the literal
    let mut forward = Forward {
        a: "${b}".into(),
        b: "literal".into(),
    };
    r.replace_self(&mut forward).unwrap();
    assert_eq!(forward.a, "literal");

    // `b` is visited first and sees `a` unresolved
    let mut backward = Backward {
        b: "${a}".into(),
        a: "${c}".into(),
    };
    r.replace_self(&mut backward).unwrap();
    assert_eq!(backward.b, "${c}");
    assert_eq!(backward.a, "${c}");
}

#[test]
fn resolved_configuration_opens_a_store() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().display().to_string();

    let mut config = Config::from_yaml(
        r#"
store:
  database: ${DATA_DIR}/test.db
  mode: 384
  timeout: 2
"#,
    )
    .unwrap();
    config.resolve(&replacer(&[("DATA_DIR", data_dir.as_str())])).unwrap();

    let section: &Mapping = config.get("store").unwrap().as_mapping().unwrap();
    let options = StoreOptions::from_mapping(section).unwrap();
    assert_eq!(options.database, dir.path().join("test.db"));

    let mut store = FileStore::new();
    store.open(&options).unwrap();
    store.put(b"test-bucket", b"hello", b"world").unwrap();
    assert_eq!(
        store.get(b"test-bucket", b"hello").unwrap(),
        Some(b"world".to_vec())
    );
    store.delete(b"test-bucket", b"hello").unwrap();
    store.close().unwrap();
}
