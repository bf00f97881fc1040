//! Criteria compilation tests

#[cfg(test)]
mod tests {
    use crate::criteria::{CriteriaBuilder, OperatorRegistry, QueryParams};
    use crate::errors::DataStoreError;
    use table_schema::{ColumnDefinition, ColumnType, TableBuilder, TableDefinitions, TableDefinitionsBuilder};
    use type_mapping::{Dialect, SqlValue};

    fn person_tables() -> TableDefinitions {
        TableDefinitionsBuilder::new()
            .table(
                TableBuilder::new("Person")
                    .id(ColumnDefinition::new("id", ColumnType::Integer).serial())
                    .column(ColumnDefinition::new("Name", ColumnType::String))
                    .column(ColumnDefinition::new("Age", ColumnType::Integer)),
            )
            .build()
            .unwrap()
    }

    fn device_tables() -> TableDefinitions {
        TableDefinitionsBuilder::new()
            .table(
                TableBuilder::new("Device")
                    .single_table_inheritance()
                    .column(ColumnDefinition::new("name", ColumnType::String)),
            )
            .table(TableBuilder::new("Switch").extends("device"))
            .table(TableBuilder::new("CoreSwitch").extends("switch"))
            .table(TableBuilder::new("Router").extends("device"))
            .build()
            .unwrap()
    }

    fn compile(
        tables: &TableDefinitions,
        table: &str,
        params: &QueryParams,
    ) -> Result<(String, Vec<SqlValue>), DataStoreError> {
        compile_with(tables, table, params, Dialect::Postgres)
    }

    fn compile_with(
        tables: &TableDefinitions,
        table: &str,
        params: &QueryParams,
        dialect: Dialect,
    ) -> Result<(String, Vec<SqlValue>), DataStoreError> {
        let registry = OperatorRegistry::standard();
        let definition = tables.get(table).unwrap();
        let mut builder =
            CriteriaBuilder::new(tables, definition, &registry, dialect, 1).with_prefix("");
        builder.build_sql(params)?;
        Ok(builder.into_parts())
    }

    fn sql_of(params: &[(&str, &str)]) -> String {
        let tables = person_tables();
        let params: QueryParams = params.iter().copied().collect();
        compile(&tables, "person", &params).unwrap().0
    }

    // ========================================
    // Single predicates
    // ========================================

    #[test]
    fn test_comparisons() {
        assert_eq!(sql_of(&[("@id", "[eq]12")]), " id = $1");
        assert_eq!(sql_of(&[("@id", "12")]), " id = $1");
        assert_eq!(sql_of(&[("@id", "[gt]12")]), " id > $1");
        assert_eq!(sql_of(&[("@id", "[>=]12")]), " id >= $1");
        assert_eq!(sql_of(&[("@id", "[ne]12")]), " id != $1");
        assert_eq!(sql_of(&[("@id", "[lte]12")]), " id <= $1");
    }

    #[test]
    fn test_comparison_binds_typed_value() {
        let tables = person_tables();
        let params = QueryParams::new().with("@id", "[gt]12").with("@Name", "[eq]abc");
        let (_, args) = compile(&tables, "person", &params).unwrap();
        assert_eq!(args, vec![SqlValue::Integer(12), SqlValue::Text("abc".into())]);
    }

    #[test]
    fn test_in_lists() {
        assert_eq!(sql_of(&[("@id", "[in]1,2,3")]), " id IN ( 1,2,3 )");
        assert_eq!(sql_of(&[("@id", "[in]1, 2 ,3")]), " id IN ( 1,2,3 )");
        assert_eq!(sql_of(&[("@Name", "[in]1,2,3")]), " Name IN ( '1', '2', '3' )");
        assert_eq!(sql_of(&[("@id", "[nin]4,5")]), " id NOT IN ( 4,5 )");
        assert_eq!(sql_of(&[("@Name", "[in]o'neil")]), " Name IN ( 'o''neil' )");
    }

    #[test]
    fn test_in_lists_bind_nothing() {
        let tables = person_tables();
        let params = QueryParams::new().with("@id", "[in]1,2,3");
        let (_, args) = compile(&tables, "person", &params).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_between_and_is() {
        assert_eq!(sql_of(&[("@id", "[between]1,2")]), " (id BETWEEN $1 AND $2)");
        assert_eq!(sql_of(&[("@id", "[is]null")]), " id IS NULL");
        assert_eq!(sql_of(&[("@id", "[is]NotNull")]), " id IS NOT NULL");
        assert_eq!(sql_of(&[("@Name", "[like]ab%")]), " Name LIKE $1");
    }

    // ========================================
    // Combined predicates
    // ========================================

    #[test]
    fn test_predicates_are_joined_with_and() {
        assert_eq!(
            sql_of(&[("@id", "[eq]1"), ("@Name", "[eq]a"), ("@Age", "[eq]3")]),
            " id = $1 AND Name = $2 AND Age = $3"
        );
        assert_eq!(
            sql_of(&[("@id", "[eq]1"), ("@Name", "[between]a,b"), ("@Age", "[eq]3")]),
            " id = $1 AND (Name BETWEEN $2 AND $3) AND Age = $4"
        );
    }

    #[test]
    fn test_indexed_keys_repeat_a_column() {
        assert_eq!(
            sql_of(&[("@id[0]", "[gte]1"), ("@id[1]", "[lt]9")]),
            " id >= $1 AND id < $2"
        );
    }

    #[test]
    fn test_default_prefix_and_start_index() {
        let tables = person_tables();
        let registry = OperatorRegistry::standard();
        let person = tables.get("person").unwrap();
        let mut builder = CriteriaBuilder::new(&tables, person, &registry, Dialect::Postgres, 3);
        builder.build(&QueryParams::new().with("@Age", "[gt]7")).unwrap();
        assert_eq!(builder.next_index(), 4);
        assert_eq!(builder.sql(), " WHERE Age > $3");
    }

    #[test]
    fn test_reserved_keys_are_not_predicates() {
        assert_eq!(sql_of(&[("includes", "*"), ("@id", "1")]), " id = $1");
        assert_eq!(sql_of(&[]), "");
    }

    // ========================================
    // Trailing clauses
    // ========================================

    #[test]
    fn test_group_order_and_paging() {
        assert_eq!(
            sql_of(&[
                ("@Age", "[gt]1"),
                ("group_by", "Age"),
                ("having", "count(*) > 1"),
                ("order", "Age DESC"),
                ("limit", "10"),
                ("offset", "20"),
            ]),
            " Age > $1 GROUP BY Age HAVING count(*) > 1 ORDER BY Age DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql_of(&[("offset", "20")]), "");
    }

    #[test]
    fn test_paging_per_dialect() {
        let tables = person_tables();
        let params = QueryParams::new().with("limit", "10").with("offset", "5");
        let sqlite = compile_with(&tables, "person", &params, Dialect::Sqlite).unwrap();
        assert_eq!(sqlite.0, " LIMIT 5 , 10");
        let mssql = compile_with(&tables, "person", &params, Dialect::MsSql).unwrap();
        assert_eq!(mssql.0, " OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY");
    }

    #[test]
    fn test_question_mark_placeholders() {
        let tables = person_tables();
        let params = QueryParams::new().with("@id", "1").with("@Age", "[between]1,5");
        let (sql, args) = compile_with(&tables, "person", &params, Dialect::Sqlite).unwrap();
        assert_eq!(sql, " id = ? AND (Age BETWEEN ? AND ?)");
        assert_eq!(args.len(), 3);
    }

    // ========================================
    // Errors
    // ========================================

    fn error_of(params: &[(&str, &str)]) -> DataStoreError {
        let tables = person_tables();
        let params: QueryParams = params.iter().copied().collect();
        compile(&tables, "person", &params).unwrap_err()
    }

    #[test]
    fn test_unknown_column_and_operator() {
        assert_eq!(
            error_of(&[("@missing", "1")]),
            DataStoreError::Validation("column 'missing' is not exists in the Person.".into())
        );
        assert_eq!(
            error_of(&[("@id", "[regex]1")]),
            DataStoreError::UnsupportedOperator("'regex' is unsupported operator for the column 'id'.".into())
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(error_of(&[("@id", "abc")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("@id", "[in]1,x")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("@id", "[in]")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("@id", "[is]maybe")]), DataStoreError::Validation(_)));
        assert!(matches!(
            error_of(&[("@id", "[between]1")]),
            DataStoreError::Validation(msg) if msg.contains("it must has two value")
        ));
        for raw in ["[between]a,b,c", "[between]a,", "[between],b"] {
            assert!(matches!(
                error_of(&[("@Name", raw)]),
                DataStoreError::Validation(msg) if msg.contains("it must has two value")
            ));
        }
        assert!(matches!(error_of(&[("@id", "[between]1,2,3")]), DataStoreError::Validation(_)));
    }

    #[test]
    fn test_unsupported_forms() {
        assert!(matches!(error_of(&[("@id", "[like]1")]), DataStoreError::UnsupportedOperator(_)));
        assert!(matches!(error_of(&[("@id", "[exists]")]), DataStoreError::UnsupportedOperator(_)));
    }

    #[test]
    fn test_invalid_trailing_clauses() {
        assert!(matches!(error_of(&[("limit", "0")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("limit", "x")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("limit", "1"), ("offset", "-1")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("limit", "1"), ("limit", "2")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("order", "")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("order", "id; DROP TABLE x")]), DataStoreError::Validation(_)));
        assert!(matches!(error_of(&[("having", "1=1 --")]), DataStoreError::Validation(_)));
    }

    // ========================================
    // Class discriminators
    // ========================================

    #[test]
    fn test_type_equals_expands_descendants() {
        let tables = device_tables();
        let params = QueryParams::new().with("@type", "switch");
        let (sql, args) = compile(&tables, "device", &params).unwrap();
        assert_eq!(sql, " type IN ( 'switch', 'core_switch' )");
        assert!(args.is_empty());

        let params = QueryParams::new().with("@type", "router");
        let (sql, _) = compile(&tables, "device", &params).unwrap();
        assert_eq!(sql, " type = 'router'");
    }

    #[test]
    fn test_type_in_unions_hierarchies() {
        let tables = device_tables();
        let params = QueryParams::new().with("@type", "[in]router,switch");
        let (sql, _) = compile(&tables, "device", &params).unwrap();
        assert_eq!(sql, " type IN ( 'router', 'switch', 'core_switch' )");
    }

    #[test]
    fn test_type_rejects_unknown_table_and_other_operators() {
        let tables = device_tables();
        let params = QueryParams::new().with("@type", "printer");
        assert!(matches!(
            compile(&tables, "device", &params),
            Err(DataStoreError::Validation(_))
        ));
        let params = QueryParams::new().with("@type", "[gt]router");
        assert!(matches!(
            compile(&tables, "device", &params),
            Err(DataStoreError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_equal_class_narrows_subclasses_only() {
        let tables = device_tables();
        let registry = OperatorRegistry::standard();

        let switch = tables.get("switch").unwrap();
        let mut builder = CriteriaBuilder::new(&tables, switch, &registry, Dialect::Postgres, 1);
        builder.equal_class("type");
        assert_eq!(builder.sql(), " WHERE type IN ( 'switch', 'core_switch' )");

        let device = tables.get("device").unwrap();
        let mut builder = CriteriaBuilder::new(&tables, device, &registry, Dialect::Postgres, 1);
        builder.equal_class("type");
        assert_eq!(builder.sql(), "");
    }
}
