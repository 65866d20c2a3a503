//! Header and data round trip through the in-memory engine: a schema plus a
//! value store written out and rebuilt from the file must compare equal.

use std::path::Path;

use grid_bridge::prelude::*;

fn sample() -> (Schema, ValueStore) {
    let mut schema = Schema::new();
    schema.add_dimension("time", 1);
    schema.add_dimension("level", 3);
    schema.add_dimension("cell", 4);

    let mut temp = Variable::new(ElementType::Double);
    temp.push_dim("time", 1);
    temp.push_dim("level", 3);
    temp.push_dim("cell", 4);
    temp.add_attribute("units", AttrValue::Str("K".into()));
    schema.add_variable("temp", temp).expect("register temp");

    let mut cell_id = Variable::new(ElementType::Int);
    cell_id.push_dim("cell", 4);
    schema.add_variable("cell_id", cell_id).expect("register cell_id");

    schema.add_global_attribute("source", AttrValue::Str("round-trip fixture".into()));

    let mut store = ValueStore::new();
    store.add(
        "temp",
        Values::Double((0..12).map(|i| i as f64 * 0.5).collect()),
    );
    store.add("cell_id", Values::Int(vec![3, 1, 4, 1]));
    (schema, store)
}

fn write_out(engine: &mut MemoryEngine, path: &Path, schema: &Schema, store: &ValueStore) {
    engine.open(path, FileMode::Write).expect("open for write");
    for (name, size) in schema.dimensions() {
        engine.add_dimension(name, size).expect("dimension");
    }
    for (name, var) in schema.variables() {
        let dims: Vec<String> = var.dim_names().map(str::to_owned).collect();
        engine
            .add_variable(name, var.element_type(), &dims)
            .expect("variable");
        for (attr, value) in var.attributes() {
            engine
                .add_attribute(Some(name), attr, value.clone())
                .expect("variable attribute");
        }
    }
    for (attr, value) in schema.global_attributes() {
        engine
            .add_attribute(None, attr, value.clone())
            .expect("global attribute");
    }
    for name in store.names() {
        engine
            .write_full(name, store.try_get(name).expect("staged buffer"))
            .expect("bulk write");
    }
    engine.close().expect("close");
}

fn read_back(engine: &mut MemoryEngine, path: &Path) -> (Schema, ValueStore) {
    engine.open(path, FileMode::Read).expect("open for read");
    let mut schema = Schema::new();
    for (name, size) in engine.dimensions().expect("dimensions") {
        schema.add_dimension(&name, size);
    }
    for info in engine.variables().expect("variables") {
        let mut var = Variable::new(info.element_type);
        for dim in &info.dims {
            let size = schema.dimension_size(dim).expect("known dimension");
            var.push_dim(dim, size);
        }
        for (name, value) in info.attrs {
            var.add_attribute(&name, value);
        }
        schema.add_variable(&info.name, var).expect("register");
    }
    for (name, value) in engine.global_attributes().expect("globals") {
        schema.add_global_attribute(&name, value);
    }
    let mut store = ValueStore::new();
    for name in ["temp", "cell_id"] {
        store.add(name, engine.read_full(name).expect("bulk read"));
    }
    engine.close().expect("close");
    (schema, store)
}

#[test]
fn header_and_data_survive_a_file_cycle() {
    let (schema, store) = sample();
    let shared = MemoryStore::new();
    let path = Path::new("round_trip.nc");

    let mut writer = MemoryEngine::with_store(shared.clone());
    write_out(&mut writer, path, &schema, &store);
    assert!(shared.contains(path));

    let mut reader = MemoryEngine::with_store(shared);
    let (schema_back, store_back) = read_back(&mut reader, path);

    assert_eq!(schema, schema_back);
    assert_eq!(store, store_back);
    assert_eq!(
        schema_back
            .try_global_attribute("source")
            .expect("global attribute")
            .as_str(),
        Some("round-trip fixture")
    );
    assert_eq!(
        schema_back.try_variable("temp").expect("temp").total_size(),
        12
    );
}

#[test]
fn rewriting_the_same_file_replaces_it() {
    let (schema, store) = sample();
    let shared = MemoryStore::new();
    let path = Path::new("rewrite.nc");

    let mut engine = MemoryEngine::with_store(shared.clone());
    write_out(&mut engine, path, &schema, &store);

    // A second write cycle with fewer variables fully replaces the first.
    let mut small = Schema::new();
    small.add_dimension("cell", 4);
    let mut cell_id = Variable::new(ElementType::Int);
    cell_id.push_dim("cell", 4);
    small.add_variable("cell_id", cell_id).expect("register");
    let mut small_store = ValueStore::new();
    small_store.add("cell_id", Values::Int(vec![9, 9, 9, 9]));
    write_out(&mut engine, path, &small, &small_store);

    let mut reader = MemoryEngine::with_store(shared);
    reader.open(path, FileMode::Read).expect("open");
    assert_eq!(reader.variables().expect("variables").len(), 1);
    assert_eq!(
        reader.read_full("cell_id").expect("read"),
        Values::Int(vec![9, 9, 9, 9])
    );
    assert!(reader.read_full("temp").is_err());
    reader.close().expect("close");
}
