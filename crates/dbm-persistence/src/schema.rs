// Esquema Diesel portable (SQLite / Postgres): uuids y JSON como texto,
// instantes como milisegundos en columnas `*_ts`.
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    tickets (id) {
        id -> Text,
        ticket_type -> Text,
        creator -> Text,
        bk_biz_id -> BigInt,
        group_name -> Text,
        remark -> Text,
        details -> Text,
        status -> Text,
        created_at_ts -> BigInt,
        updated_at_ts -> BigInt,
    }
}
diesel::table! {
    flows (id) {
        id -> Text,
        ticket_id -> Text,
        ordinal -> BigInt,
        flow_type -> Text,
        flow_alias -> Text,
        flow_obj_id -> Nullable<Text>,
        details -> Text,
        status -> Text,
        retry_type -> Text,
        retry_count -> BigInt,
        err_code -> Nullable<Text>,
        err_msg -> Nullable<Text>,
        created_at_ts -> BigInt,
        updated_at_ts -> BigInt,
    }
}
diesel::table! {
    todos (id) {
        id -> Text,
        ticket_id -> Text,
        flow_id -> Text,
        todo_type -> Text,
        operators -> Text,
        status -> Text,
        context -> Text,
        done_by -> Nullable<Text>,
        created_at_ts -> BigInt,
        done_at_ts -> Nullable<BigInt>,
    }
}
allow_tables_to_appear_in_same_query!(tickets, flows, todos);
