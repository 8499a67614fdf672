mod mock_market;
mod scenarios;
