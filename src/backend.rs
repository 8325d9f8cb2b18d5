use lootcase_api::{
    ApiClient,
    ApiError,
    dto::{
        BalanceDto,
        CaseDto,
        HistoryDto,
        InventoryItemDto,
        OpenCaseResponseDto,
        SellItemResponseDto,
        StarsInvoiceDto,
        TransactionDto,
        UserProfileDto,
    },
};

/// Remote side of the case-opening game.
///
/// `ApiClient` talks to the real backend; tests use
/// `test_helpers::FakeBackend`.
pub trait CasesBackend {
    fn check_availability(&self) -> impl Future<Output = bool>;

    fn list_cases(&self) -> impl Future<Output = Result<Vec<CaseDto>, ApiError>>;

    fn case_details(&self, case_id: &str) -> impl Future<Output = Result<CaseDto, ApiError>>;

    fn open_case(
        &self,
        case_id: &str,
        user_id: u64,
    ) -> impl Future<Output = Result<OpenCaseResponseDto, ApiError>>;

    fn balance(&self, user_id: u64) -> impl Future<Output = Result<BalanceDto, ApiError>>;

    fn create_stars_invoice(
        &self,
        user_id: u64,
        stars_amount: u64,
    ) -> impl Future<Output = Result<StarsInvoiceDto, ApiError>>;

    fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = Result<TransactionDto, ApiError>>;

    fn inventory(
        &self,
        user_id: u64,
    ) -> impl Future<Output = Result<Vec<InventoryItemDto>, ApiError>>;

    fn sell_item(
        &self,
        item_id: &str,
        user_id: u64,
    ) -> impl Future<Output = Result<SellItemResponseDto, ApiError>>;

    fn profile(&self, user_id: u64) -> impl Future<Output = Result<UserProfileDto, ApiError>>;

    fn history(&self, user_id: u64) -> impl Future<Output = Result<HistoryDto, ApiError>>;

    /// Drops anything cached about the user, e.g. after a payment.
    fn forget_user_data(&self) {}
}

impl CasesBackend for ApiClient {
    fn check_availability(&self) -> impl Future<Output = bool> {
        ApiClient::check_availability(self)
    }

    fn list_cases(&self) -> impl Future<Output = Result<Vec<CaseDto>, ApiError>> {
        ApiClient::list_cases(self)
    }

    fn case_details(&self, case_id: &str) -> impl Future<Output = Result<CaseDto, ApiError>> {
        ApiClient::case_details(self, case_id)
    }

    fn open_case(
        &self,
        case_id: &str,
        user_id: u64,
    ) -> impl Future<Output = Result<OpenCaseResponseDto, ApiError>> {
        ApiClient::open_case(self, case_id, user_id)
    }

    fn balance(&self, user_id: u64) -> impl Future<Output = Result<BalanceDto, ApiError>> {
        ApiClient::balance(self, user_id)
    }

    fn create_stars_invoice(
        &self,
        user_id: u64,
        stars_amount: u64,
    ) -> impl Future<Output = Result<StarsInvoiceDto, ApiError>> {
        ApiClient::create_stars_invoice(self, user_id, stars_amount)
    }

    fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = Result<TransactionDto, ApiError>> {
        ApiClient::transaction_status(self, transaction_id)
    }

    fn inventory(
        &self,
        user_id: u64,
    ) -> impl Future<Output = Result<Vec<InventoryItemDto>, ApiError>> {
        ApiClient::inventory(self, user_id)
    }

    fn sell_item(
        &self,
        item_id: &str,
        user_id: u64,
    ) -> impl Future<Output = Result<SellItemResponseDto, ApiError>> {
        ApiClient::sell_item(self, item_id, user_id)
    }

    fn profile(&self, user_id: u64) -> impl Future<Output = Result<UserProfileDto, ApiError>> {
        ApiClient::profile(self, user_id)
    }

    fn history(&self, user_id: u64) -> impl Future<Output = Result<HistoryDto, ApiError>> {
        ApiClient::history(self, user_id)
    }

    fn forget_user_data(&self) {
        self.cache().invalidate_prefix("user_");
    }
}
