//! One-shot DDL for the `scores` table, its ordering index, and the change-notification trigger
//! (spec §6.1). Applying it is idempotent; running it against an already-migrated database is a
//! no-op.

pub(crate) const CHANGE_CHANNEL: &str = "scores_changes";

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS scores (
    player      TEXT PRIMARY KEY CHECK (char_length(player) BETWEEN 1 AND 20),
    score       BIGINT NOT NULL CHECK (score >= 0),
    updated_at  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS scores_rank_idx ON scores (score DESC, player ASC);

CREATE OR REPLACE FUNCTION notify_scores_change() RETURNS trigger AS $$
DECLARE
    payload JSON;
BEGIN
    IF TG_OP = 'DELETE' THEN
        payload := json_build_object('player_name', OLD.player, 'score', OLD.score, 'op', 'delete');
    ELSIF TG_OP = 'INSERT' THEN
        payload := json_build_object('player_name', NEW.player, 'score', NEW.score, 'op', 'insert');
    ELSIF NEW.score IS DISTINCT FROM OLD.score THEN
        payload := json_build_object('player_name', NEW.player, 'score', NEW.score, 'op', 'update');
    ELSE
        RETURN NEW;
    END IF;

    PERFORM pg_notify('scores_changes', payload::text);
    RETURN COALESCE(NEW, OLD);
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS scores_change_trigger ON scores;
CREATE TRIGGER scores_change_trigger
    AFTER INSERT OR UPDATE OR DELETE ON scores
    FOR EACH ROW EXECUTE FUNCTION notify_scores_change();
"#;

/// Apply the schema, index, trigger function, and trigger. Safe to call on every startup.
pub(crate) async fn migrate(client: &tokio_postgres::Client) -> Result<(), tokio_postgres::Error> {
    client.batch_execute(DDL).await
}
