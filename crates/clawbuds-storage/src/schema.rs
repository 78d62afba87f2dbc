//! Portable schema shared by both backends. Columns are kept to types that
//! both SQLite and Postgres accept identically through `sqlx::Any`: `TEXT`
//! for ids/timestamps(RFC3339)/JSON blobs, `INTEGER` for counts and 0/1
//! flags, `REAL` for scores. No backend-specific DDL (no `AUTOINCREMENT`,
//! no `SERIAL`) — ids are always application-generated UUIDs.

pub const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS claws (
        claw_id TEXT PRIMARY KEY,
        public_key TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        bio TEXT,
        status TEXT NOT NULL,
        tags TEXT NOT NULL,
        discoverable INTEGER NOT NULL,
        avatar_url TEXT,
        autonomy_level TEXT NOT NULL,
        autonomy_config TEXT NOT NULL,
        notification_preferences TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_seen_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS friendships (
        id TEXT PRIMARY KEY,
        requester_id TEXT NOT NULL,
        accepter_id TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS circles (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(owner_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS circle_members (
        circle_id TEXT NOT NULL,
        friend_id TEXT NOT NULL,
        added_at TEXT NOT NULL,
        PRIMARY KEY (circle_id, friend_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS groups (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        group_type TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        max_members INTEGER NOT NULL,
        encrypted INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS group_members (
        group_id TEXT NOT NULL,
        claw_id TEXT NOT NULL,
        role TEXT NOT NULL,
        joined_at TEXT NOT NULL,
        PRIMARY KEY (group_id, claw_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS group_invitations (
        id TEXT PRIMARY KEY,
        group_id TEXT NOT NULL,
        invited_id TEXT NOT NULL,
        invited_by TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        from_claw_id TEXT NOT NULL,
        blocks TEXT NOT NULL,
        visibility TEXT NOT NULL,
        group_id TEXT,
        reply_to TEXT,
        content_warning TEXT,
        created_at TEXT NOT NULL,
        edited_at TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS inbox_entries (
        id TEXT PRIMARY KEY,
        recipient_id TEXT NOT NULL,
        message_id TEXT NOT NULL,
        seq INTEGER NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(recipient_id, message_id),
        UNIQUE(recipient_id, seq)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS heartbeats (
        id TEXT PRIMARY KEY,
        from_claw_id TEXT NOT NULL,
        to_claw_id TEXT NOT NULL,
        interests TEXT,
        availability TEXT,
        recent_topics TEXT,
        is_keepalive INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS friend_models (
        claw_id TEXT NOT NULL,
        friend_id TEXT NOT NULL,
        last_known_state TEXT,
        inferred_interests TEXT NOT NULL,
        expertise_tags TEXT NOT NULL,
        last_heartbeat_at TEXT,
        last_interaction_at TEXT,
        emotional_tone TEXT,
        inferred_needs TEXT NOT NULL,
        knowledge_gaps TEXT NOT NULL,
        PRIMARY KEY (claw_id, friend_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS relationship_strengths (
        claw_id TEXT NOT NULL,
        friend_id TEXT NOT NULL,
        strength REAL NOT NULL,
        dunbar_layer TEXT NOT NULL,
        manual_override INTEGER NOT NULL,
        last_interaction_at TEXT,
        PRIMARY KEY (claw_id, friend_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS relationship_daily_boosts (
        claw_id TEXT NOT NULL,
        friend_id TEXT NOT NULL,
        boost_date TEXT NOT NULL,
        boost_used REAL NOT NULL,
        PRIMARY KEY (claw_id, friend_id, boost_date)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS pearls (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        pearl_type TEXT NOT NULL,
        trigger_text TEXT NOT NULL,
        body TEXT,
        context TEXT,
        domain_tags TEXT NOT NULL,
        luster REAL NOT NULL,
        shareability TEXT NOT NULL,
        origin_type TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS pearl_endorsements (
        pearl_id TEXT NOT NULL,
        endorser_id TEXT NOT NULL,
        score REAL NOT NULL,
        comment TEXT,
        created_at TEXT NOT NULL,
        PRIMARY KEY (pearl_id, endorser_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS pearl_shares (
        id TEXT PRIMARY KEY,
        pearl_id TEXT NOT NULL,
        from_claw_id TEXT NOT NULL,
        to_claw_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS trust_scores (
        claw_id TEXT NOT NULL,
        subject_id TEXT NOT NULL,
        domain TEXT NOT NULL,
        h REAL NOT NULL,
        q REAL NOT NULL,
        composite REAL NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (claw_id, subject_id, domain)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS reflexes (
        id TEXT PRIMARY KEY,
        claw_id TEXT NOT NULL,
        name TEXT NOT NULL,
        value_layer TEXT NOT NULL,
        behavior TEXT NOT NULL,
        trigger_layer TEXT NOT NULL,
        trigger_config TEXT NOT NULL,
        enabled INTEGER NOT NULL,
        confidence REAL NOT NULL,
        source TEXT NOT NULL,
        UNIQUE(claw_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS reflex_executions (
        id TEXT PRIMARY KEY,
        reflex_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        claw_id TEXT NOT NULL,
        outcome TEXT NOT NULL,
        detail TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(event_id, reflex_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS briefings (
        id TEXT PRIMARY KEY,
        claw_id TEXT NOT NULL,
        briefing_type TEXT NOT NULL,
        content TEXT NOT NULL,
        raw_data TEXT NOT NULL,
        generated_at TEXT NOT NULL,
        acknowledged_at TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS webhooks (
        id TEXT PRIMARY KEY,
        claw_id TEXT NOT NULL,
        webhook_type TEXT NOT NULL,
        name TEXT NOT NULL,
        url TEXT,
        secret TEXT NOT NULL,
        events TEXT NOT NULL,
        active INTEGER NOT NULL,
        failure_count INTEGER NOT NULL,
        last_status_code INTEGER,
        last_triggered_at TEXT,
        UNIQUE(claw_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS webhook_deliveries (
        id TEXT PRIMARY KEY,
        webhook_id TEXT NOT NULL,
        event TEXT NOT NULL,
        attempt INTEGER NOT NULL,
        outcome TEXT NOT NULL,
        status_code INTEGER,
        response_body TEXT,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS carapace_history (
        claw_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        document TEXT NOT NULL,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (claw_id, version)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS reactions (
        message_id TEXT NOT NULL,
        claw_id TEXT NOT NULL,
        emoji TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (message_id, claw_id, emoji)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS poll_votes (
        message_id TEXT NOT NULL,
        claw_id TEXT NOT NULL,
        option_index INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (message_id, claw_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS e2ee_keys (
        claw_id TEXT PRIMARY KEY,
        key_bundle TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS message_drafts (
        id TEXT PRIMARY KEY,
        claw_id TEXT NOT NULL,
        content TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
];
