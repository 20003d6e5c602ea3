use proptest::prelude::*;
use rowtable::{ColumnDef, DataType, NullTracking, SortAlgorithm, Table, TableOptions, Value};

fn text_strategy(max_len: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[a-zA-Z0-9 ]{{0,{max_len}}}"))
        .expect("valid regex")
}

/// Values that fit a column of `data_type` declared with `max_size`.
fn value_strategy(data_type: DataType, max_size: usize) -> BoxedStrategy<Value> {
    let max_len = if max_size == 0 { 48 } else { max_size };
    match data_type {
        DataType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        DataType::Int8 => any::<i8>().prop_map(Value::Int8).boxed(),
        DataType::Int16 => any::<i16>().prop_map(Value::Int16).boxed(),
        DataType::Int32 => any::<i32>().prop_map(Value::Int32).boxed(),
        DataType::Int64 => any::<i64>().prop_map(Value::Int64).boxed(),
        DataType::UInt8 => any::<u8>().prop_map(Value::UInt8).boxed(),
        DataType::UInt16 => any::<u16>().prop_map(Value::UInt16).boxed(),
        DataType::UInt32 => any::<u32>().prop_map(Value::UInt32).boxed(),
        DataType::UInt64 => any::<u64>().prop_map(Value::UInt64).boxed(),
        DataType::Float => (-1.0e6f32..1.0e6f32).prop_map(Value::Float).boxed(),
        DataType::Double => (-1.0e12f64..1.0e12f64).prop_map(Value::Double).boxed(),
        DataType::Pointer => any::<u64>().prop_map(Value::Pointer).boxed(),
        DataType::Guid => any::<[u8; 16]>().prop_map(Value::Guid).boxed(),
        DataType::Utf8 => text_strategy(max_len).prop_map(Value::from).boxed(),
        DataType::Json => text_strategy(max_len)
            .prop_map(|s| Value::Json(s.into()))
            .boxed(),
        DataType::Xml => text_strategy(max_len)
            .prop_map(|s| Value::Xml(s.into()))
            .boxed(),
        DataType::Binary => proptest::collection::vec(any::<u8>(), 0..=max_len)
            .prop_map(Value::from)
            .boxed(),
        DataType::Date => any::<i32>().prop_map(Value::Date).boxed(),
        DataType::Time => any::<i64>().prop_map(Value::Time).boxed(),
        DataType::DateTime => any::<i64>().prop_map(Value::DateTime).boxed(),
    }
}

fn schema_strategy() -> impl Strategy<Value = Vec<(DataType, usize)>> {
    proptest::collection::vec(
        (proptest::sample::select(DataType::ALL.to_vec()), 0usize..24),
        1..12,
    )
}

fn build(schema: &[(DataType, usize)], options: TableOptions) -> Table {
    let defs: Vec<ColumnDef> = schema
        .iter()
        .enumerate()
        .map(|(i, &(data_type, max_size))| {
            ColumnDef::new(format!("c{i}"), data_type).with_max_size(max_size)
        })
        .collect();
    Table::create(&defs, options).unwrap()
}

/// A schema together with a handful of rows that fit it.
fn rows_strategy() -> impl Strategy<Value = (Vec<(DataType, usize)>, Vec<Vec<Value>>)> {
    schema_strategy().prop_flat_map(|schema| {
        let row: Vec<BoxedStrategy<Value>> = schema
            .iter()
            .map(|&(data_type, max_size)| value_strategy(data_type, max_size))
            .collect();
        (Just(schema), proptest::collection::vec(row, 0..20))
    })
}

fn int_table(keys: &[i32], options: TableOptions) -> Table {
    let mut table = Table::create(
        &[
            ColumnDef::new("key", DataType::Int32),
            ColumnDef::new("tag", DataType::Utf8).with_max_size(12),
        ],
        options,
    )
    .unwrap();
    for (i, &key) in keys.iter().enumerate() {
        table
            .row_add_values(&[Value::Int32(key), Value::from(format!("t{i}"))])
            .unwrap();
    }
    table
}

fn read_rows(table: &Table) -> Vec<Vec<Value>> {
    table.iter_rows().collect()
}

proptest! {
    #[test]
    fn layout_is_aligned_and_dense(schema in schema_strategy()) {
        let table = build(&schema, TableOptions::default());
        let columns = table.columns();

        let mut expected = 0;
        for column in columns.iter() {
            prop_assert_eq!(column.byte_offset % 4, 0);
            prop_assert_eq!(column.byte_offset, expected);
            prop_assert!(column.byte_offset < table.row_stride());
            expected += column.slot_size().div_ceil(4) * 4;
        }
        prop_assert_eq!(table.row_stride(), expected);
    }

    #[test]
    fn set_then_get_round_trips((schema, rows) in rows_strategy()) {
        let mut table = build(&schema, TableOptions::default().with_capacity(2));
        for row in &rows {
            table.row_add_values(row).unwrap();
        }
        prop_assert_eq!(read_rows(&table), rows);
    }

    #[test]
    fn overwrite_round_trips((schema, rows) in rows_strategy()) {
        prop_assume!(rows.len() >= 2);
        let mut table = build(&schema, TableOptions::default());
        table.row_add_values(&rows[0]).unwrap();
        for (col, value) in rows[1].iter().enumerate() {
            table.cell_set(0, col, value).unwrap();
        }
        prop_assert_eq!(table.row_get(0), rows[1].clone());
    }

    #[test]
    fn growth_preserves_rows(
        keys in proptest::collection::vec(any::<i32>(), 0..300),
        capacity in 0usize..8,
        grow_by in 0usize..16,
    ) {
        let options = TableOptions::default().with_capacity(capacity).with_grow_by(grow_by);
        let table = int_table(&keys, options);

        prop_assert_eq!(table.row_count(), keys.len());
        prop_assert!(table.row_count() <= table.reserved_row_count());
        let stored: Vec<Value> = table.harvest_column(0, 0, keys.len());
        let expected: Vec<Value> = keys.iter().copied().map(Value::Int32).collect();
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn erase_keeps_remaining_order(
        keys in proptest::collection::vec(any::<i32>(), 1..40),
        from_seed in any::<usize>(),
        count_seed in any::<usize>(),
    ) {
        let from = from_seed % keys.len();
        let count = count_seed % (keys.len() - from + 1);
        let mut table = int_table(&keys, TableOptions::default());
        let mut model = read_rows(&table);

        table.erase(from, count);
        model.drain(from..from + count);

        prop_assert_eq!(read_rows(&table), model);
    }

    #[test]
    fn swap_twice_is_identity(
        keys in proptest::collection::vec(any::<i32>(), 1..40),
        a_seed in any::<usize>(),
        b_seed in any::<usize>(),
    ) {
        let (a, b) = (a_seed % keys.len(), b_seed % keys.len());
        let mut table = int_table(&keys, TableOptions::default().with_null_tracking(NullTracking::Narrow));
        table.cell_set_null(a, 1).unwrap();
        let before = read_rows(&table);

        table.swap(a, b);
        table.swap(a, b);
        prop_assert_eq!(read_rows(&table), before);
    }

    #[test]
    fn sort_orders_column(
        keys in proptest::collection::vec(-50i32..50, 0..40),
        ascending in any::<bool>(),
        bubble in any::<bool>(),
    ) {
        let algorithm = if bubble { SortAlgorithm::Bubble } else { SortAlgorithm::Selection };
        let mut table = int_table(&keys, TableOptions::default());
        let mut before = read_rows(&table);

        table.sort(0, ascending, 0, keys.len(), algorithm);

        let sorted: Vec<i64> = table
            .harvest_column(0, 0, keys.len())
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        let ordered = sorted.windows(2).all(|w| if ascending { w[0] <= w[1] } else { w[0] >= w[1] });
        prop_assert!(ordered, "{:?}", sorted);

        // rows are permuted, never altered
        let mut after = read_rows(&table);
        let key = |row: &Vec<Value>| row[1].as_string();
        before.sort_by_key(key);
        after.sort_by_key(key);
        prop_assert_eq!(after, before);
    }

    #[test]
    fn append_adds_source_rows(
        left in proptest::collection::vec(any::<i32>(), 0..20),
        right in proptest::collection::vec(any::<i32>(), 0..20),
    ) {
        let mut table = int_table(&left, TableOptions::default());
        let other = int_table(&right, TableOptions::default());

        table.append(&other).unwrap();

        prop_assert_eq!(table.row_count(), left.len() + right.len());
        for row in 0..right.len() {
            prop_assert_eq!(table.row_get(left.len() + row), other.row_get(row));
        }
    }

    #[test]
    fn equal_blobs_share_one_entry(words in proptest::collection::vec("[a-c]{1,2}", 1..30)) {
        let mut table =
            Table::create(&[ColumnDef::new("w", DataType::Utf8)], TableOptions::default()).unwrap();
        for word in &words {
            table.row_add_values(&[Value::from(word.as_str())]).unwrap();
        }

        let mut distinct = words.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(table.blob_count(), distinct.len());

        let total: u32 = table.blobs().iter().map(|entry| entry.reference_count()).sum();
        prop_assert_eq!(total as usize, words.len());
        for (row, word) in words.iter().enumerate() {
            prop_assert_eq!(table.cell_get(row, 0).as_string(), word.clone());
        }
    }
}
