//! SQL query constants
//!
//! Contains the schema and every statement issued against PostgreSQL.

pub const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        address VARCHAR(42) UNIQUE NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_PROPOSALS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS proposals (
        id SERIAL PRIMARY KEY,
        onchain_id VARCHAR(100) UNIQUE NOT NULL,
        title VARCHAR(500) NOT NULL,
        description TEXT NOT NULL,
        published BOOLEAN NOT NULL DEFAULT false,
        state INTEGER NOT NULL DEFAULT 0 CHECK (state BETWEEN 0 AND 7),
        for_votes BIGINT NOT NULL DEFAULT 0,
        against_votes BIGINT NOT NULL DEFAULT 0,
        abstain_votes BIGINT NOT NULL DEFAULT 0,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_proposals_user_id ON proposals(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_proposals_published ON proposals(published)",
    "CREATE INDEX IF NOT EXISTS idx_proposals_created_at ON proposals(created_at DESC)",
];

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub const LIST_USERS: &str = r#"
    SELECT id, address, status, created_at, updated_at
    FROM users
    ORDER BY created_at DESC, id DESC
"#;

pub const GET_USER_BY_ID: &str = r#"
    SELECT id, address, status, created_at, updated_at
    FROM users WHERE id = $1
"#;

pub const GET_USER_BY_ADDRESS: &str = r#"
    SELECT id, address, status, created_at, updated_at
    FROM users WHERE address = $1
"#;

/// Returns no row when the address is already registered
pub const INSERT_USER_IF_ABSENT: &str = r#"
    INSERT INTO users (address)
    VALUES ($1)
    ON CONFLICT (address) DO NOTHING
    RETURNING id, address, status, created_at, updated_at
"#;

pub const UPDATE_USER_STATUS: &str = r#"
    UPDATE users SET status = $2, updated_at = NOW()
    WHERE id = $1
    RETURNING id, address, status, created_at, updated_at
"#;

pub const DELETE_USER: &str = "DELETE FROM users WHERE id = $1";

// ---------------------------------------------------------------------------
// Proposals
//
// Every read returns the proposal columns followed by the owning user's
// columns, see `db::proposals::proposal_from_row`.
// ---------------------------------------------------------------------------

pub const LIST_PROPOSALS: &str = r#"
    SELECT p.id, p.onchain_id, p.title, p.description, p.published, p.state,
           p.for_votes, p.against_votes, p.abstain_votes, p.user_id,
           p.created_at, p.updated_at,
           u.id, u.address, u.status, u.created_at, u.updated_at
    FROM proposals p
    LEFT JOIN users u ON u.id = p.user_id
    WHERE ($1::BOOLEAN IS NULL OR p.published = $1)
      AND ($2::INTEGER IS NULL OR p.state = $2)
      AND ($3::INTEGER IS NULL OR p.user_id = $3)
    ORDER BY p.created_at DESC, p.id DESC
    LIMIT $4 OFFSET $5
"#;

pub const COUNT_PROPOSALS: &str = r#"
    SELECT COUNT(*)
    FROM proposals p
    WHERE ($1::BOOLEAN IS NULL OR p.published = $1)
      AND ($2::INTEGER IS NULL OR p.state = $2)
      AND ($3::INTEGER IS NULL OR p.user_id = $3)
"#;

pub const GET_PROPOSAL_BY_ID: &str = r#"
    SELECT p.id, p.onchain_id, p.title, p.description, p.published, p.state,
           p.for_votes, p.against_votes, p.abstain_votes, p.user_id,
           p.created_at, p.updated_at,
           u.id, u.address, u.status, u.created_at, u.updated_at
    FROM proposals p
    LEFT JOIN users u ON u.id = p.user_id
    WHERE p.id = $1
"#;

pub const GET_PROPOSAL_BY_ONCHAIN_ID: &str = r#"
    SELECT p.id, p.onchain_id, p.title, p.description, p.published, p.state,
           p.for_votes, p.against_votes, p.abstain_votes, p.user_id,
           p.created_at, p.updated_at,
           u.id, u.address, u.status, u.created_at, u.updated_at
    FROM proposals p
    LEFT JOIN users u ON u.id = p.user_id
    WHERE p.onchain_id = $1
"#;

pub const PROPOSAL_EXISTS_BY_ONCHAIN_ID: &str =
    "SELECT EXISTS(SELECT 1 FROM proposals WHERE onchain_id = $1)";

pub const INSERT_PROPOSAL: &str = r#"
    WITH inserted AS (
        INSERT INTO proposals (onchain_id, title, description, published, state, user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
    )
    SELECT p.id, p.onchain_id, p.title, p.description, p.published, p.state,
           p.for_votes, p.against_votes, p.abstain_votes, p.user_id,
           p.created_at, p.updated_at,
           u.id, u.address, u.status, u.created_at, u.updated_at
    FROM inserted p
    LEFT JOIN users u ON u.id = p.user_id
"#;

/// `NULL` parameters keep the current value
pub const UPDATE_PROPOSAL: &str = r#"
    WITH updated AS (
        UPDATE proposals SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            published = COALESCE($4, published),
            state = COALESCE($5, state),
            for_votes = COALESCE($6, for_votes),
            against_votes = COALESCE($7, against_votes),
            abstain_votes = COALESCE($8, abstain_votes),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
    )
    SELECT p.id, p.onchain_id, p.title, p.description, p.published, p.state,
           p.for_votes, p.against_votes, p.abstain_votes, p.user_id,
           p.created_at, p.updated_at,
           u.id, u.address, u.status, u.created_at, u.updated_at
    FROM updated p
    LEFT JOIN users u ON u.id = p.user_id
"#;

pub const DELETE_PROPOSAL: &str = "DELETE FROM proposals WHERE id = $1";

pub const PROPOSAL_TOTALS: &str = r#"
    SELECT COUNT(*),
           COUNT(*) FILTER (WHERE published),
           COUNT(*) FILTER (WHERE NOT published)
    FROM proposals
"#;

pub const PROPOSAL_COUNT_BY_STATE: &str = r#"
    SELECT state, COUNT(*)
    FROM proposals
    GROUP BY state
    ORDER BY state
"#;
