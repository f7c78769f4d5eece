//! Ledger and settlement schema.
//!
//! Creates the chart of accounts, ledger accounts, journal entries and lines,
//! settlements, settlement details and merchant accounts, plus the triggers
//! that keep posted entries balanced and immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(SUBJECTS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(ENTRY_LINES_SQL).await?;

        // ============================================================
        // PART 3: SETTLEMENT
        // ============================================================
        db.execute_unprepared(SETTLEMENTS_SQL).await?;
        db.execute_unprepared(SETTLEMENT_DETAILS_SQL).await?;
        db.execute_unprepared(MERCHANT_ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // ============================================================
        // PART 5: SEED DATA
        // ============================================================
        db.execute_unprepared(SEED_SUBJECTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const SUBJECTS_SQL: &str = r"
CREATE TABLE subjects (
    code VARCHAR(32) PRIMARY KEY,
    name VARCHAR(128) NOT NULL,
    subject_type VARCHAR(16) NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_subject_type CHECK (
        subject_type IN ('asset', 'liability', 'equity', 'income', 'expense')
    )
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    subject_code VARCHAR(32) NOT NULL REFERENCES subjects(code) ON DELETE RESTRICT,
    entity_id VARCHAR(64) NOT NULL,
    balance BIGINT NOT NULL DEFAULT 0,
    currency VARCHAR(8) NOT NULL,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_accounts_subject_entity UNIQUE (subject_code, entity_id),
    CONSTRAINT chk_account_version CHECK (version >= 0)
);

CREATE INDEX idx_accounts_entity ON accounts(entity_id);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    entry_no VARCHAR(64) NOT NULL,
    transaction_id VARCHAR(128) NOT NULL,
    event_type VARCHAR(32) NOT NULL,
    posting_date DATE NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_journal_entries_entry_no UNIQUE (entry_no),
    CONSTRAINT uq_journal_entries_transaction_id UNIQUE (transaction_id),
    CONSTRAINT chk_event_type CHECK (
        event_type IN ('payment_success', 'reversal', 'adjustment', 'manual')
    )
);

CREATE INDEX idx_journal_entries_posting_date ON journal_entries(posting_date);
";

const ENTRY_LINES_SQL: &str = r"
CREATE TABLE entry_lines (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE RESTRICT,
    line_no INTEGER NOT NULL,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
    direction VARCHAR(8) NOT NULL,
    amount BIGINT NOT NULL,
    memo TEXT,
    CONSTRAINT uq_entry_lines_entry_line UNIQUE (entry_id, line_no),
    CONSTRAINT chk_direction CHECK (direction IN ('debit', 'credit')),
    CONSTRAINT chk_line_amount_positive CHECK (amount > 0)
);

CREATE INDEX idx_entry_lines_account ON entry_lines(account_id);
";

const SETTLEMENTS_SQL: &str = r"
CREATE TABLE settlements (
    id UUID PRIMARY KEY,
    settlement_no VARCHAR(64) NOT NULL,
    merchant_id VARCHAR(64) NOT NULL,
    cycle VARCHAR(16) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    order_count BIGINT NOT NULL DEFAULT 0,
    total_amount BIGINT NOT NULL DEFAULT 0,
    platform_fee BIGINT NOT NULL DEFAULT 0,
    settlement_amount BIGINT NOT NULL DEFAULT 0,
    status VARCHAR(16) NOT NULL DEFAULT 'pending',
    fail_reason TEXT,
    settled_at TIMESTAMPTZ,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_settlements_settlement_no UNIQUE (settlement_no),
    CONSTRAINT chk_settlement_cycle CHECK (cycle IN ('daily', 'weekly', 'monthly')),
    CONSTRAINT chk_settlement_status CHECK (
        status IN ('pending', 'processing', 'completed', 'failed')
    ),
    CONSTRAINT chk_settlement_period CHECK (end_date >= start_date),
    CONSTRAINT chk_settlement_totals CHECK (settlement_amount + platform_fee = total_amount)
);

CREATE INDEX idx_settlements_merchant ON settlements(merchant_id, created_at DESC);
CREATE INDEX idx_settlements_status ON settlements(status);
";

const SETTLEMENT_DETAILS_SQL: &str = r"
CREATE TABLE settlement_details (
    id UUID PRIMARY KEY,
    settlement_id UUID NOT NULL REFERENCES settlements(id) ON DELETE CASCADE,
    order_id VARCHAR(64) NOT NULL,
    order_no VARCHAR(64) NOT NULL,
    order_amount BIGINT NOT NULL,
    platform_fee BIGINT NOT NULL,
    settlement_amount BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_settlement_details_order UNIQUE (order_id),
    CONSTRAINT chk_detail_amount_positive CHECK (order_amount > 0),
    CONSTRAINT chk_detail_split CHECK (settlement_amount + platform_fee = order_amount)
);

CREATE INDEX idx_settlement_details_settlement ON settlement_details(settlement_id, created_at);
";

const MERCHANT_ACCOUNTS_SQL: &str = r"
CREATE TABLE merchant_accounts (
    id UUID PRIMARY KEY,
    merchant_id VARCHAR(64) NOT NULL,
    balance BIGINT NOT NULL DEFAULT 0,
    frozen_balance BIGINT NOT NULL DEFAULT 0,
    total_income BIGINT NOT NULL DEFAULT 0,
    total_withdraw BIGINT NOT NULL DEFAULT 0,
    fee_rate NUMERIC(10, 6) NOT NULL,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_merchant_accounts_merchant UNIQUE (merchant_id),
    CONSTRAINT chk_fee_rate_range CHECK (fee_rate >= 0 AND fee_rate <= 1)
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_balance
-- Debit and credit lines of an entry must sum to the same amount
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    total_debit BIGINT;
    total_credit BIGINT;
    line_count INTEGER;
BEGIN
    SELECT
        COALESCE(SUM(amount) FILTER (WHERE direction = 'debit'), 0),
        COALESCE(SUM(amount) FILTER (WHERE direction = 'credit'), 0),
        COUNT(*)
    INTO total_debit, total_credit, line_count
    FROM entry_lines
    WHERE entry_id = NEW.entry_id;

    IF line_count < 2 THEN
        RAISE EXCEPTION 'Journal entry % has fewer than two lines', NEW.entry_id;
    END IF;

    IF total_debit <> total_credit THEN
        RAISE EXCEPTION 'Journal entry is not balanced. Debit: %, Credit: %',
            total_debit, total_credit;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT ON entry_lines
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: prevent_ledger_modification
-- Posted entries are immutable; corrections use reversing entries
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Cannot modify posted % rows. Create a reversing entry instead.', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_entry_mod
BEFORE UPDATE OR DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_modification();

CREATE TRIGGER trg_prevent_line_mod
BEFORE UPDATE OR DELETE ON entry_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_modification();

-- ============================================================
-- FUNCTION: prevent_detail_modification
-- Settlement details are append-only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_detail_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Settlement details are append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_detail_update
BEFORE UPDATE ON settlement_details
FOR EACH ROW
EXECUTE FUNCTION prevent_detail_modification();
";

const SEED_SUBJECTS_SQL: &str = r"
INSERT INTO subjects (code, name, subject_type, description) VALUES
    ('1122', 'Receivable - Payment Channel', 'asset', 'Gross payments captured by the channel and not yet received'),
    ('2202', 'Accounts Payable - Merchant', 'liability', 'Cleared order amounts owed to merchants'),
    ('6001', 'Income - Platform Fees', 'income', 'Commission retained by the platform'),
    ('6601', 'Expense - Channel Fees', 'expense', 'Fees charged by payment channels')
ON CONFLICT (code) DO NOTHING;
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS merchant_accounts CASCADE;
DROP TABLE IF EXISTS settlement_details CASCADE;
DROP TABLE IF EXISTS settlements CASCADE;
DROP TABLE IF EXISTS entry_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TABLE IF EXISTS subjects CASCADE;
DROP FUNCTION IF EXISTS check_entry_balance() CASCADE;
DROP FUNCTION IF EXISTS prevent_ledger_modification() CASCADE;
DROP FUNCTION IF EXISTS prevent_detail_modification() CASCADE;
";
