use dialobild_core::db::open_db_in_memory;
use dialobild_core::model::graph::NewNode;
use dialobild_core::repo::graph_repo::{GraphRepository, SqliteGraphRepository};
use dialobild_core::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use dialobild_core::{
    ErrorKind, GraphError, Position, Project, ProjectRef, ProjectService, ReconcileOutcome,
    ReconcileService, ValidationError, WireNode,
};
use rusqlite::Connection;
use serde_json::{json, Value};

const OWNER: i64 = 7;

fn setup() -> (Connection, Project) {
    let conn = open_db_in_memory().unwrap();
    let project = seed_project(&conn);
    (conn, project)
}

fn seed_project(conn: &Connection) -> Project {
    let repo = SqliteProjectRepository::new(conn);
    let project = repo.create_project("intro", OWNER).unwrap();
    let statement = repo
        .create_node_type("statement", "Statement", "#ffffff")
        .unwrap();
    let question = repo
        .create_node_type("question", "Question", "#ffcc00")
        .unwrap();
    let must_have = repo.create_rule_type("mustHave", "Must have").unwrap();
    let can_have = repo.create_rule_type("canHave", "Can have").unwrap();
    repo.attach_node_type(project.id, statement.id).unwrap();
    repo.attach_node_type(project.id, question.id).unwrap();
    repo.attach_rule_type(project.id, must_have.id).unwrap();
    repo.attach_rule_type(project.id, can_have.id).unwrap();
    repo.set_default_rule(project.id, Some("mustHave")).unwrap();
    repo.get_project(project.id).unwrap().unwrap()
}

fn node(id: Value, node_type: &str, content: &str, x: i64, y: i64, rules: Value) -> WireNode {
    serde_json::from_value(json!({
        "id": id,
        "nodeType": node_type,
        "content": content,
        "location": {"x": x, "y": y},
        "rules": rules,
    }))
    .unwrap()
}

fn save(
    conn: &Connection,
    project: &Project,
    nodes: &[WireNode],
) -> Result<ReconcileOutcome, GraphError> {
    ReconcileService::new(conn)
        .reconcile(OWNER, &ProjectRef::Id(project.id), nodes)
        .map(|reconciled| reconciled.outcome)
}

fn counters(outcome: &ReconcileOutcome) -> (usize, usize, usize) {
    (outcome.added, outcome.modified, outcome.deleted)
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn load(conn: &Connection, project: &Project) -> Vec<WireNode> {
    ProjectService::new(conn)
        .load_project(OWNER, &ProjectRef::Id(project.id))
        .unwrap()
        .nodes
}

fn targets(node: &WireNode, code: &str) -> Vec<String> {
    node.rules
        .get(code)
        .map(|ids| ids.iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}

#[test]
fn first_save_creates_node_and_reports_new_id() {
    let (conn, project) = setup();

    let outcome = save(
        &conn,
        &project,
        &[node(json!(1), "statement", "Hello", 0, 0, json!({}))],
    )
    .unwrap();

    assert_eq!(counters(&outcome), (1, 0, 0));
    assert_eq!(outcome.new_node_ids.len(), 1);
    let assigned = outcome.new_node_ids["1"];

    let nodes = load(&conn, &project);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id.as_node_id(), Some(assigned));
    assert_eq!(nodes[0].content, "Hello");
}

#[test]
fn resubmitting_persisted_projection_changes_nothing() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "question", "Continue?", 1, 1, json!({"mustHave": ["b"]})),
            node(json!("b"), "statement", "Yes", 1, 2, json!({})),
        ],
    )
    .unwrap();
    assert_eq!(counters(&outcome), (2, 0, 0));

    let persisted = load(&conn, &project);
    let again = save(&conn, &project, &persisted).unwrap();

    assert_eq!(counters(&again), (0, 0, 0));
    assert!(again.new_node_ids.is_empty());
    assert_eq!(load(&conn, &project), persisted);
}

#[test]
fn projection_lists_every_rule_code() {
    let (conn, project) = setup();
    save(
        &conn,
        &project,
        &[node(json!("a"), "statement", "Alone", 2, 2, json!({}))],
    )
    .unwrap();

    let nodes = load(&conn, &project);
    assert_eq!(nodes[0].rules.len(), 2);
    assert!(nodes[0].rules["mustHave"].is_empty());
    assert!(nodes[0].rules["canHave"].is_empty());
}

#[test]
fn forward_references_resolve_regardless_of_order() {
    let (conn, project) = setup();

    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({"mustHave": ["b"]})),
            node(json!("b"), "statement", "B", 2, 1, json!({"mustHave": ["a"]})),
        ],
    )
    .unwrap();

    let a = outcome.new_node_ids["a"].to_string();
    let b = outcome.new_node_ids["b"].to_string();
    assert_eq!(count(&conn, "node_rules"), 2);

    let nodes = load(&conn, &project);
    let node_a = nodes.iter().find(|n| n.id.as_str() == a).unwrap();
    let node_b = nodes.iter().find(|n| n.id.as_str() == b).unwrap();
    assert_eq!(targets(node_a, "mustHave"), vec![b.clone()]);
    assert_eq!(targets(node_b, "mustHave"), vec![a.clone()]);
}

#[test]
fn unknown_rule_code_fails_and_leaves_graph_unchanged() {
    let (conn, project) = setup();
    save(
        &conn,
        &project,
        &[node(json!("a"), "statement", "Kept", 1, 1, json!({}))],
    )
    .unwrap();
    let before = load(&conn, &project);

    let err = save(
        &conn,
        &project,
        &[
            node(json!("n"), "statement", "New", 3, 3, json!({})),
            node(json!("m"), "statement", "Bad", 4, 4, json!({"unknownRule": ["n"]})),
        ],
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::UnknownRuleType(ref code)) if code == "unknownRule"
    ));
    assert_eq!(load(&conn, &project), before);
}

#[test]
fn unknown_node_type_is_validation_error() {
    let (conn, project) = setup();
    let err = save(
        &conn,
        &project,
        &[node(json!("a"), "answer", "?", 1, 1, json!({}))],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::UnknownNodeType(_))
    ));
}

#[test]
fn unresolved_forward_reference_rolls_back_created_nodes() {
    let (conn, project) = setup();

    let err = save(
        &conn,
        &project,
        &[node(json!("a"), "statement", "A", 1, 1, json!({"mustHave": ["ghost"]}))],
    )
    .unwrap_err();

    match err {
        GraphError::Validation(ValidationError::UnresolvedForwardReference { targets }) => {
            assert_eq!(targets, vec!["ghost".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "nodes"), 0);
    assert_eq!(count(&conn, "node_rules"), 0);
}

#[test]
fn duplicate_submitted_ids_are_rejected() {
    let (conn, project) = setup();
    let err = save(
        &conn,
        &project,
        &[
            node(json!(5), "statement", "A", 1, 1, json!({})),
            node(json!("5"), "statement", "B", 2, 1, json!({})),
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::DuplicateNodeId(_))
    ));
    assert_eq!(count(&conn, "nodes"), 0);
}

#[test]
fn omitted_nodes_are_deleted_with_their_edges() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({"mustHave": ["b"]})),
            node(json!("b"), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();
    let b = outcome.new_node_ids["b"];

    let outcome = save(
        &conn,
        &project,
        &[node(json!(b), "statement", "B", 1, 2, json!({}))],
    )
    .unwrap();

    assert_eq!(counters(&outcome), (0, 0, 1));
    assert_eq!(count(&conn, "nodes"), 1);
    assert_eq!(count(&conn, "node_rules"), 0);
}

#[test]
fn changed_content_counts_as_modified() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[node(json!("a"), "statement", "Draft", 1, 1, json!({}))],
    )
    .unwrap();
    let a = outcome.new_node_ids["a"];

    let outcome = save(
        &conn,
        &project,
        &[node(json!(a), "question", "Final?", 2, 1, json!({}))],
    )
    .unwrap();

    assert_eq!(counters(&outcome), (0, 1, 0));
    let nodes = load(&conn, &project);
    assert_eq!(nodes[0].node_type, "question");
    assert_eq!(nodes[0].content, "Final?");
    assert_eq!(nodes[0].location, Position::new(2, 1));
}

#[test]
fn changing_rule_code_relabels_the_existing_edge() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({"mustHave": ["b"]})),
            node(json!("b"), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();
    let (a, b) = (outcome.new_node_ids["a"], outcome.new_node_ids["b"]);
    let edge_before: i64 = conn
        .query_row("SELECT id FROM node_rules;", [], |row| row.get(0))
        .unwrap();

    let outcome = save(
        &conn,
        &project,
        &[
            node(json!(a), "statement", "A", 1, 1, json!({"canHave": [b], "mustHave": []})),
            node(json!(b), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();

    assert_eq!(counters(&outcome), (0, 1, 0));
    let (edge_after, code): (i64, String) = conn
        .query_row(
            "SELECT r.id, t.code FROM node_rules r JOIN rule_types t ON t.id = r.rule_type_id;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(edge_after, edge_before);
    assert_eq!(code, "canHave");
}

#[test]
fn duplicate_targets_collapse_to_one_edge() {
    let (conn, project) = setup();
    save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({"mustHave": ["b", "b"]})),
            node(json!("b"), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();
    assert_eq!(count(&conn, "node_rules"), 1);
}

#[test]
fn origin_node_is_never_updated_or_deleted() {
    let (conn, project) = setup();
    let node_types = SqliteProjectRepository::new(&conn)
        .list_node_types(project.id)
        .unwrap();
    let start = SqliteGraphRepository::new(&conn)
        .insert_node(&NewNode {
            project_id: project.id,
            node_type_id: node_types[0].id,
            content: "Start".to_string(),
            position: Position::UNPLACED,
        })
        .unwrap();

    let outcome = save(&conn, &project, &[]).unwrap();
    assert_eq!(counters(&outcome), (0, 0, 0));

    let outcome = save(
        &conn,
        &project,
        &[node(json!(start.id), "question", "Changed", 0, 0, json!({}))],
    )
    .unwrap();
    assert_eq!(counters(&outcome), (0, 0, 0));

    let nodes = load(&conn, &project);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].content, "Start");
}

#[test]
fn project_of_another_owner_is_not_found() {
    let (conn, project) = setup();
    let err = ReconcileService::new(&conn)
        .reconcile(OWNER + 1, &ProjectRef::Id(project.id), &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ReconcileService::new(&conn)
        .reconcile(OWNER, &ProjectRef::Name("missing".to_string()), &[])
        .unwrap_err();
    assert!(matches!(err, GraphError::ProjectNotFound(_)));
}

#[test]
fn project_can_be_addressed_by_name() {
    let (conn, project) = setup();
    let reconciled = ReconcileService::new(&conn)
        .reconcile(
            OWNER,
            &ProjectRef::Name("intro".to_string()),
            &[node(json!("a"), "statement", "A", 1, 1, json!({}))],
        )
        .unwrap();
    assert_eq!(reconciled.project.id, project.id);
    assert_eq!(reconciled.outcome.added, 1);
}

#[test]
fn applying_the_same_payload_twice_is_a_no_op() {
    let (conn, project) = setup();
    let payload = [node(json!(1), "statement", "Hello", 0, 0, json!({}))];

    let first = save(&conn, &project, &payload).unwrap();
    assert_eq!(counters(&first), (1, 0, 0));
    assert_eq!(first.new_node_ids["1"], 1);
    let after_first = load(&conn, &project);

    let second = save(&conn, &project, &payload).unwrap();
    assert_eq!(counters(&second), (0, 0, 0));
    assert!(second.new_node_ids.is_empty());
    assert_eq!(load(&conn, &project), after_first);
}

#[test]
fn persisted_node_can_point_at_node_created_later_in_batch() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({"mustHave": ["b"]})),
            node(json!("b"), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();
    let (a, b) = (outcome.new_node_ids["a"], outcome.new_node_ids["b"]);

    let outcome = save(
        &conn,
        &project,
        &[
            node(json!(a), "statement", "A", 1, 1, json!({"mustHave": [b, "later"]})),
            node(json!(b), "statement", "B", 1, 2, json!({})),
            node(json!("later"), "question", "Later?", 2, 2, json!({})),
        ],
    )
    .unwrap();

    assert_eq!(counters(&outcome), (1, 1, 0));
    let later = outcome.new_node_ids["later"].to_string();
    let nodes = load(&conn, &project);
    let node_a = nodes.iter().find(|n| n.id.as_node_id() == Some(a)).unwrap();
    let mut must_have = targets(node_a, "mustHave");
    must_have.sort();
    let mut expected = vec![b.to_string(), later];
    expected.sort();
    assert_eq!(must_have, expected);
    assert_eq!(count(&conn, "node_rules"), 2);
}

#[test]
fn aliased_integer_targets_collapse_to_one_edge() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({})),
            node(json!("b"), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();
    let (a, b) = (outcome.new_node_ids["a"], outcome.new_node_ids["b"]);

    let outcome = save(
        &conn,
        &project,
        &[
            node(
                json!(a),
                "statement",
                "A",
                1,
                1,
                json!({"mustHave": [b, format!("0{b}")]}),
            ),
            node(json!(b), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();

    assert_eq!(counters(&outcome), (0, 1, 0));
    assert_eq!(count(&conn, "node_rules"), 1);
}

#[test]
fn aliased_integer_node_ids_are_duplicates() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[node(json!("a"), "statement", "A", 1, 1, json!({}))],
    )
    .unwrap();
    let a = outcome.new_node_ids["a"];

    let err = save(
        &conn,
        &project,
        &[
            node(json!(a), "statement", "First", 1, 1, json!({})),
            node(json!(format!("0{a}")), "statement", "Second", 2, 1, json!({})),
        ],
    )
    .unwrap_err();

    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::DuplicateNodeId(ref id)) if *id == a.to_string()
    ));
    assert_eq!(load(&conn, &project)[0].content, "A");
}

#[test]
fn edges_under_detached_rule_types_survive_round_trip() {
    let (conn, project) = setup();
    let outcome = save(
        &conn,
        &project,
        &[
            node(json!("a"), "statement", "A", 1, 1, json!({"canHave": ["b"]})),
            node(json!("b"), "statement", "B", 1, 2, json!({})),
        ],
    )
    .unwrap();
    let a = outcome.new_node_ids["a"];
    conn.execute(
        "DELETE FROM project_rule_types
         WHERE project_id = ?1
           AND rule_type_id = (SELECT id FROM rule_types WHERE code = 'canHave');",
        [project.id],
    )
    .unwrap();

    let persisted = load(&conn, &project);
    let node_a = persisted
        .iter()
        .find(|n| n.id.as_node_id() == Some(a))
        .unwrap();
    assert!(!node_a.rules.contains_key("canHave"));

    let again = save(&conn, &project, &persisted).unwrap();

    assert_eq!(counters(&again), (0, 0, 0));
    assert_eq!(count(&conn, "node_rules"), 1);
}
